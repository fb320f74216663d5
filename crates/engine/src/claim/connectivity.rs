//! Connectivity of a claim's partitions.
//!
//! Partitions are nodes; two nodes share an edge when their areas overlap or
//! meet along an edge segment. A claim is valid only while this graph has a
//! single component.

use std::collections::VecDeque;

use crate::geometry::Area;

/// Whether every area is reachable from the first one. An empty set counts as
/// connected.
pub fn is_connected(areas: &[Area]) -> bool {
    if areas.is_empty() {
        return true;
    }

    let mut visited = vec![false; areas.len()];
    let mut queue = VecDeque::from([0usize]);
    visited[0] = true;
    let mut reached = 1;

    while let Some(current) = queue.pop_front() {
        for (next, area) in areas.iter().enumerate() {
            if visited[next] || !areas[current].is_adjacent_or_overlapping(area) {
                continue;
            }
            visited[next] = true;
            reached += 1;
            queue.push_back(next);
        }
    }

    reached == areas.len()
}

/// Number of connected components. Used for diagnostics when an invariant
/// check fails.
pub fn component_count(areas: &[Area]) -> usize {
    let mut visited = vec![false; areas.len()];
    let mut components = 0;

    for start in 0..areas.len() {
        if visited[start] {
            continue;
        }
        components += 1;
        visited[start] = true;
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for (next, area) in areas.iter().enumerate() {
                if !visited[next] && areas[current].is_adjacent_or_overlapping(area) {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(x1: i32, z1: i32, x2: i32, z2: i32) -> Area {
        Area::new((x1, z1), (x2, z2))
    }

    #[test]
    fn empty_and_single_are_connected() {
        assert!(is_connected(&[]));
        assert!(is_connected(&[area(0, 0, 10, 10)]));
    }

    #[test]
    fn chain_through_shared_edges() {
        let areas = [area(0, 0, 10, 10), area(10, 0, 20, 10), area(20, 0, 30, 10)];
        assert!(is_connected(&areas));
        assert_eq!(component_count(&areas), 1);
    }

    #[test]
    fn removing_the_middle_link_splits() {
        let areas = [area(0, 0, 10, 10), area(20, 0, 30, 10)];
        assert!(!is_connected(&areas));
        assert_eq!(component_count(&areas), 2);
    }

    #[test]
    fn corner_contact_is_not_a_link() {
        let areas = [area(0, 0, 10, 10), area(10, 10, 20, 20)];
        assert!(!is_connected(&areas));
    }

    #[test]
    fn order_does_not_matter() {
        let areas = [area(20, 0, 30, 10), area(0, 0, 10, 10), area(10, 0, 20, 10)];
        assert!(is_connected(&areas));
    }
}
