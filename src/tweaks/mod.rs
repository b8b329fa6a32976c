// src/tweaks/mod.rs

pub mod definitions;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use strum_macros::{Display, EnumIter, EnumString};

use crate::resources::{ResourceRef, TypedValue};

/// Unique identifier for each tweak in the catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum TweakId {
    GameMode,
    VisualEffects,
    NetworkLatency,
    InputLag,
    FullscreenOptimizations,
    MouseAcceleration,
    BackgroundApps,
    GpuScheduling,
    TimerResolution,
    DisableHpet,
    DisableCoreParking,
    HighPerformancePower,
    DisableServices,
    DisableXboxServices,
}

/// One declarative resource mutation. `value: None` means delete/unset.
///
/// Every resource a tweak will touch is declared here so the ledger can
/// capture its prior state before any side effect of the tweak, including the
/// ones fired through external commands.
#[derive(Debug, Clone)]
pub struct ResourceWrite {
    pub resource: ResourceRef,
    pub value: Option<TypedValue>,
    /// Human-readable line reported in the tweak outcome on success.
    pub change: String,
}

impl ResourceWrite {
    pub fn set(resource: ResourceRef, value: TypedValue, change: &str) -> Self {
        Self {
            resource,
            value: Some(value),
            change: change.to_string(),
        }
    }
}

/// An external command invocation needed to make a tweak's writes effective
/// (service stop, netsh, bcdedit, powercfg duplicate). Command steps have no
/// snapshot of their own; any restorable state they touch must also appear as
/// a declared [`ResourceWrite`].
#[derive(Debug, Clone)]
pub struct CommandStep {
    pub program: String,
    pub args: Vec<String>,
    /// Secondary steps (stopping an already-stopped service, a best-effort
    /// scheme duplication) log a warning on failure instead of failing the
    /// tweak.
    pub best_effort: bool,
    pub change: String,
}

impl CommandStep {
    pub fn new(program: &str, args: &[&str], change: &str) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            best_effort: false,
            change: change.to_string(),
        }
    }

    pub fn best_effort(program: &str, args: &[&str], change: &str) -> Self {
        Self {
            best_effort: true,
            ..Self::new(program, args, change)
        }
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// A named, idempotent unit of work. Immutable definition, stateless:
/// running it twice produces the same end state, and the second run's
/// snapshot capture is a no-op.
#[derive(Debug, Clone)]
pub struct Tweak {
    pub id: TweakId,
    pub name: &'static str,
    pub description: &'static str,
    pub writes: Vec<ResourceWrite>,
    pub commands: Vec<CommandStep>,
    pub requires_elevation: bool,
}

impl Tweak {
    /// All resources this tweak declares, in write order.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceRef> {
        self.writes.iter().map(|w| &w.resource)
    }
}

/// An ordered sequence of tweaks executed as one user-requested action.
/// Order matters only for observable side effects, not for snapshot
/// correctness.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub name: &'static str,
    pub description: &'static str,
    pub tweaks: Vec<TweakId>,
}

static CATALOG: Lazy<IndexMap<TweakId, Tweak>> = Lazy::new(|| {
    let mut map = IndexMap::new();
    for tweak in [
        definitions::game_mode(),
        definitions::visual_effects(),
        definitions::network_latency(),
        definitions::input_lag(),
        definitions::fullscreen_optimizations(),
        definitions::mouse_acceleration(),
        definitions::background_apps(),
        definitions::gpu_scheduling(),
        definitions::timer_resolution(),
        definitions::disable_hpet(),
        definitions::disable_core_parking(),
        definitions::high_performance_power(),
        definitions::disable_services(),
        definitions::disable_xbox_services(),
    ] {
        map.insert(tweak.id, tweak);
    }
    map
});

/// The full catalog, keyed by id in declaration order.
pub fn all_tweaks() -> &'static IndexMap<TweakId, Tweak> {
    &CATALOG
}

pub fn bundles() -> Vec<Bundle> {
    vec![
        Bundle {
            name: "full",
            description: "Full system optimization",
            tweaks: vec![
                TweakId::GameMode,
                TweakId::VisualEffects,
                TweakId::HighPerformancePower,
                TweakId::NetworkLatency,
                TweakId::DisableServices,
            ],
        },
        Bundle {
            name: "ultimate",
            description: "Ultimate gaming optimization",
            tweaks: vec![
                TweakId::InputLag,
                TweakId::FullscreenOptimizations,
                TweakId::MouseAcceleration,
                TweakId::BackgroundApps,
                TweakId::GpuScheduling,
                TweakId::DisableCoreParking,
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_contains_every_id_once() {
        let catalog = all_tweaks();
        let mut seen = HashSet::new();
        for (id, tweak) in catalog {
            assert_eq!(*id, tweak.id);
            assert!(seen.insert(*id), "duplicate tweak id {id}");
            assert!(!tweak.writes.is_empty() || !tweak.commands.is_empty());
        }
    }

    #[test]
    fn catalog_covers_every_declared_id() {
        use strum::IntoEnumIterator;
        let catalog = all_tweaks();
        for id in TweakId::iter() {
            assert!(catalog.contains_key(&id), "{id} missing from catalog");
            assert_eq!(id.to_string().parse::<TweakId>().unwrap(), id);
        }
    }

    #[test]
    fn bundles_reference_only_cataloged_tweaks() {
        let catalog = all_tweaks();
        for bundle in bundles() {
            for id in &bundle.tweaks {
                assert!(catalog.contains_key(id), "{} names unknown {id}", bundle.name);
            }
        }
    }

    #[test]
    fn ultimate_bundle_finishes_with_core_parking() {
        let ultimate = bundles()
            .into_iter()
            .find(|b| b.name == "ultimate")
            .unwrap();
        assert_eq!(ultimate.tweaks.last(), Some(&TweakId::DisableCoreParking));
        assert!(!ultimate.tweaks.contains(&TweakId::HighPerformancePower));
    }

    #[test]
    fn service_tweaks_stop_after_configuring() {
        // sc stop must come after the start-mode write so a restart cannot
        // race the old start mode back in.
        let tweak = definitions::disable_services();
        assert!(tweak.requires_elevation);
        assert!(tweak.commands.iter().all(|c| c.best_effort));
        assert_eq!(tweak.writes.len(), tweak.commands.len());
    }
}
