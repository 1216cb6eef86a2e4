//! ACES Core - NSGA-II Selection Machinery
//!
//! Fast non-dominated sorting into Pareto fronts, crowding distance within
//! each front, and tournament selection on (rank, -crowding). Works on bare
//! fitness slices; indices returned refer into the caller's population.

use rand::Rng;

use crate::models::Fitness;

/// Rank and crowding assigned to one individual
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked {
    pub rank: usize,
    pub crowding: f64,
}

/// Fast non-dominated sort. Returns the Pareto fronts as index lists,
/// rank 0 first; indices within a front keep population order.
pub fn non_dominated_sort(fitness: &[Fitness]) -> Vec<Vec<usize>> {
    let n = fitness.len();
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count = vec![0usize; n];
    let mut fronts: Vec<Vec<usize>> = Vec::new();
    let mut first_front = Vec::new();

    for p in 0..n {
        for q in 0..n {
            if p == q {
                continue;
            }
            if fitness[p].dominates(&fitness[q]) {
                dominated_by[p].push(q);
            } else if fitness[q].dominates(&fitness[p]) {
                domination_count[p] += 1;
            }
        }
        if domination_count[p] == 0 {
            first_front.push(p);
        }
    }

    fronts.push(first_front);
    let mut current = 0;
    while !fronts[current].is_empty() {
        let mut next = Vec::new();
        for &p in &fronts[current] {
            for &q in &dominated_by[p] {
                domination_count[q] -= 1;
                if domination_count[q] == 0 {
                    next.push(q);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        next.sort_unstable();
        fronts.push(next);
        current += 1;
    }
    fronts.retain(|f| !f.is_empty());
    fronts
}

/// Crowding distance of each member of one front, in front order. Boundary
/// individuals on either objective get infinite distance.
pub fn crowding_distances(fitness: &[Fitness], front: &[usize]) -> Vec<f64> {
    let size = front.len();
    let mut distance = vec![0.0f64; size];
    if size <= 2 {
        return vec![f64::INFINITY; size];
    }
    for objective in 0..2 {
        let mut order: Vec<usize> = (0..size).collect();
        order.sort_by(|&a, &b| {
            let fa = fitness[front[a]].objectives[objective];
            let fb = fitness[front[b]].objectives[objective];
            fa.partial_cmp(&fb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(front[a].cmp(&front[b]))
        });
        let low = fitness[front[order[0]]].objectives[objective];
        let high = fitness[front[order[size - 1]]].objectives[objective];
        distance[order[0]] = f64::INFINITY;
        distance[order[size - 1]] = f64::INFINITY;
        let range = high - low;
        if range <= f64::EPSILON {
            continue;
        }
        for window in 1..size - 1 {
            let previous = fitness[front[order[window - 1]]].objectives[objective];
            let next = fitness[front[order[window + 1]]].objectives[objective];
            distance[order[window]] += (next - previous) / range;
        }
    }
    distance
}

/// Rank and crowding for the whole population
pub fn rank_population(fitness: &[Fitness]) -> Vec<Ranked> {
    let mut ranked = vec![
        Ranked {
            rank: usize::MAX,
            crowding: 0.0
        };
        fitness.len()
    ];
    for (rank, front) in non_dominated_sort(fitness).iter().enumerate() {
        let distances = crowding_distances(fitness, front);
        for (position, &index) in front.iter().enumerate() {
            ranked[index] = Ranked {
                rank,
                crowding: distances[position],
            };
        }
    }
    ranked
}

/// True when `a` is preferred over `b`: lower rank, then higher crowding,
/// then lower index for a stable total order.
pub fn preferred(a: usize, b: usize, ranked: &[Ranked]) -> bool {
    match ranked[a].rank.cmp(&ranked[b].rank) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => match ranked[a]
            .crowding
            .partial_cmp(&ranked[b].crowding)
            .unwrap_or(std::cmp::Ordering::Equal)
        {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => a < b,
        },
    }
}

/// k-way tournament on (rank, -crowding); returns the winning index
pub fn tournament<R: Rng>(rng: &mut R, ranked: &[Ranked], arity: usize) -> usize {
    let mut best = rng.gen_range(0..ranked.len());
    for _ in 1..arity.max(2) {
        let challenger = rng.gen_range(0..ranked.len());
        if preferred(challenger, best, ranked) {
            best = challenger;
        }
    }
    best
}

/// Indices of the `count` best individuals under (rank, -crowding, index)
pub fn select_top(fitness: &[Fitness], count: usize) -> Vec<usize> {
    let ranked = rank_population(fitness);
    let mut order: Vec<usize> = (0..fitness.len()).collect();
    order.sort_by(|&a, &b| {
        if preferred(a, b, &ranked) {
            std::cmp::Ordering::Less
        } else {
            std::cmp::Ordering::Greater
        }
    });
    order.truncate(count);
    order
}
