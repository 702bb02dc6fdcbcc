// src/drainage/rivers.rs
//! Реки: маршруты от устья вверх по дереву стока.

use crate::config::RiverSettings;
use crate::mesh::{HexId, HexMesh};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct River {
    /// Гекс, из которого река впадает в воду
    pub outflow: HexId,
    /// Гексы в порядке обхода в глубину от устья
    pub route: Vec<HexId>,
    /// Истоки: гексы маршрута, в которые ничего не стекает
    pub sources: Vec<HexId>,
}

impl River {
    #[must_use]
    pub fn len(&self) -> usize {
        self.route.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.route.is_empty()
    }
}

/// Собирает реку обходом в глубину от устья; притоки идут в порядке `drained_by`.
#[must_use]
pub fn trace_river(mesh: &HexMesh, outflow: HexId) -> River {
    let mut route = Vec::new();
    let mut sources = Vec::new();
    let mut stack = vec![outflow];
    while let Some(hex) = stack.pop() {
        route.push(hex);
        let feeders = &mesh.hex(hex).drained_by;
        if feeders.is_empty() {
            sources.push(hex);
        }
        stack.extend(feeders.iter().rev().copied());
    }
    River {
        outflow,
        route,
        sources,
    }
}

/// Оставляет заданный процент самых длинных рек.
///
/// Реки короче `min_length` отбрасываются сразу. Остальные перебираются
/// от длинных к коротким, пока принятая доля не превышает порог; реки
/// той же длины, что последняя принятая, принимаются и сверх порога.
#[must_use]
pub fn select_rivers(candidates: Vec<River>, settings: &RiverSettings) -> Vec<River> {
    let mut candidates: Vec<River> = candidates
        .into_iter()
        .filter(|r| r.len() >= settings.min_length)
        .collect();
    candidates.sort_by(|a, b| b.len().cmp(&a.len()).then(a.outflow.cmp(&b.outflow)));

    let total = candidates.len() as f64;
    let mut accepted: Vec<River> = Vec::new();
    for river in candidates {
        let share = (accepted.len() + 1) as f64 * 100.0 / total;
        let ties_last = accepted.last().is_some_and(|last| last.len() == river.len());
        if share <= settings.acceptance_percentage || ties_last {
            accepted.push(river);
        } else {
            break;
        }
    }

    tracing::debug!(
        candidates = total as usize,
        accepted = accepted.len(),
        "rivers selected"
    );
    accepted
}
