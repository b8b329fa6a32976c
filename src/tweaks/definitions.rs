// src/tweaks/definitions.rs
//
// The tweak catalog. Registry paths, values, services and commands follow the
// vendor's published tuning set; each definition declares every resource it
// touches so the orchestrator can snapshot them before applying anything.

use crate::{
    constants::{BALANCED_SCHEME, HIGH_PERFORMANCE_SCHEME},
    resources::{RegistryHive, ResourceRef, ServiceStartMode, TypedValue},
    tweaks::{CommandStep, ResourceWrite, Tweak, TweakId},
};

use RegistryHive::{CurrentUser as Hkcu, LocalMachine as Hklm};

fn dword(hive: RegistryHive, path: &str, name: &str, value: u32, change: &str) -> ResourceWrite {
    ResourceWrite::set(
        ResourceRef::registry(hive, path, name),
        TypedValue::Dword(value),
        change,
    )
}

fn string(hive: RegistryHive, path: &str, name: &str, value: &str, change: &str) -> ResourceWrite {
    ResourceWrite::set(
        ResourceRef::registry(hive, path, name),
        TypedValue::String(value.to_string()),
        change,
    )
}

fn disable_service_writes(services: &[&str]) -> (Vec<ResourceWrite>, Vec<CommandStep>) {
    let writes = services
        .iter()
        .map(|&s| {
            ResourceWrite::set(
                ResourceRef::service(s),
                TypedValue::StartMode(ServiceStartMode::Disabled),
                &format!("service '{s}' start mode set to disabled"),
            )
        })
        .collect();
    // Stopping a service that is not running reports an error; that is fine.
    let commands = services
        .iter()
        .map(|&s| CommandStep::best_effort("sc", &["stop", s], &format!("service '{s}' stopped")))
        .collect();
    (writes, commands)
}

pub fn game_mode() -> Tweak {
    const GAME_BAR: &str = "Software\\Microsoft\\GameBar";
    Tweak {
        id: TweakId::GameMode,
        name: "Enable Game Mode",
        description: "Turns on Windows Game Mode and disables the Game Bar overlay, \
                      letting the scheduler prioritize the foreground game.",
        writes: vec![
            dword(Hkcu, GAME_BAR, "AllowAutoGameMode", 1, "GameMode enabled"),
            dword(Hkcu, GAME_BAR, "AutoGameModeEnabled", 1, "auto GameMode enabled"),
            dword(
                Hkcu,
                GAME_BAR,
                "UseNexusForGameBarEnabled",
                0,
                "GameBar overlay disabled",
            ),
        ],
        commands: vec![],
        requires_elevation: false,
    }
}

pub fn visual_effects() -> Tweak {
    Tweak {
        id: TweakId::VisualEffects,
        name: "Optimize Visual Effects",
        description: "Switches visual effects to best performance and disables window \
                      animations. Font smoothing is left untouched.",
        writes: vec![
            dword(
                Hkcu,
                "Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\VisualEffects",
                "VisualFXSetting",
                2,
                "visual effects set to performance",
            ),
            string(
                Hkcu,
                "Control Panel\\Desktop",
                "DragFullWindows",
                "0",
                "window drag optimized",
            ),
            string(
                Hkcu,
                "Control Panel\\Desktop\\WindowMetrics",
                "MinAnimate",
                "0",
                "minimize animation disabled",
            ),
        ],
        commands: vec![],
        requires_elevation: false,
    }
}

pub fn network_latency() -> Tweak {
    const TCPIP: &str = "SYSTEM\\CurrentControlSet\\Services\\Tcpip\\Parameters";
    Tweak {
        id: TweakId::NetworkLatency,
        name: "Optimize Network for Gaming",
        description: "Disables delayed TCP acknowledgements and Nagle's algorithm, and \
                      tunes the TCP stack for low latency.",
        writes: vec![
            dword(Hklm, TCPIP, "TcpAckFrequency", 1, "TCP ack frequency set to 1"),
            dword(Hklm, TCPIP, "TCPNoDelay", 1, "Nagle's algorithm disabled"),
            dword(Hklm, TCPIP, "TcpDelAckTicks", 0, "delayed ack ticks removed"),
        ],
        commands: vec![
            CommandStep::best_effort(
                "netsh",
                &["int", "tcp", "set", "global", "autotuninglevel=normal"],
                "TCP autotuning set to normal",
            ),
            CommandStep::best_effort(
                "netsh",
                &["int", "tcp", "set", "global", "congestionprovider=ctcp"],
                "congestion provider set to CTCP",
            ),
        ],
        requires_elevation: true,
    }
}

pub fn input_lag() -> Tweak {
    const SYSTEM_PROFILE: &str =
        "SOFTWARE\\Microsoft\\Windows NT\\CurrentVersion\\Multimedia\\SystemProfile";
    const GAMES_TASK: &str =
        "SOFTWARE\\Microsoft\\Windows NT\\CurrentVersion\\Multimedia\\SystemProfile\\Tasks\\Games";
    Tweak {
        id: TweakId::InputLag,
        name: "Optimize Input Lag",
        description: "Gives multimedia and game tasks maximum scheduler priority and \
                      removes network throttling.",
        writes: vec![
            dword(
                Hklm,
                SYSTEM_PROFILE,
                "SystemResponsiveness",
                0,
                "SystemResponsiveness = 0 (max priority)",
            ),
            dword(
                Hklm,
                SYSTEM_PROFILE,
                "NetworkThrottlingIndex",
                0xffff_ffff,
                "network throttling disabled",
            ),
            dword(Hklm, GAMES_TASK, "GPU Priority", 8, "game GPU priority raised"),
            dword(Hklm, GAMES_TASK, "Priority", 6, "game CPU priority raised"),
            string(
                Hklm,
                GAMES_TASK,
                "Scheduling Category",
                "High",
                "game scheduling category set to high",
            ),
            string(
                Hklm,
                GAMES_TASK,
                "SFIO Priority",
                "High",
                "game storage priority set to high",
            ),
        ],
        commands: vec![],
        requires_elevation: true,
    }
}

pub fn fullscreen_optimizations() -> Tweak {
    const GAME_DVR: &str = "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\GameDVR";
    Tweak {
        id: TweakId::FullscreenOptimizations,
        name: "Disable Fullscreen Optimizations",
        description: "Forces true exclusive fullscreen and turns off Game DVR capture.",
        writes: vec![
            string(
                Hklm,
                "SYSTEM\\CurrentControlSet\\Control\\Session Manager\\Environment",
                "__COMPAT_LAYER",
                "~ DISABLEDXMAXIMIZEDWINDOWEDMODE",
                "fullscreen optimizations disabled",
            ),
            dword(Hklm, GAME_DVR, "AppCaptureEnabled", 0, "Game DVR disabled (machine)"),
            dword(Hkcu, GAME_DVR, "AppCaptureEnabled", 0, "Game DVR disabled (user)"),
        ],
        commands: vec![],
        requires_elevation: true,
    }
}

pub fn mouse_acceleration() -> Tweak {
    const MOUSE: &str = "Control Panel\\Mouse";
    Tweak {
        id: TweakId::MouseAcceleration,
        name: "Disable Mouse Acceleration",
        description: "Turns off pointer acceleration and pins sensitivity to 6/11 for \
                      raw input.",
        writes: vec![
            string(Hkcu, MOUSE, "MouseSpeed", "0", "mouse acceleration disabled"),
            string(Hkcu, MOUSE, "MouseThreshold1", "0", "mouse threshold 1 cleared"),
            string(Hkcu, MOUSE, "MouseThreshold2", "0", "mouse threshold 2 cleared"),
            string(Hkcu, MOUSE, "MouseSensitivity", "10", "sensitivity pinned to 6/11"),
        ],
        commands: vec![],
        requires_elevation: false,
    }
}

pub fn background_apps() -> Tweak {
    Tweak {
        id: TweakId::BackgroundApps,
        name: "Disable Background Apps",
        description: "Stops store apps from running in the background for the current \
                      user.",
        writes: vec![
            dword(
                Hkcu,
                "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\BackgroundAccessApplications",
                "GlobalUserDisabled",
                1,
                "background apps disabled",
            ),
            dword(
                Hkcu,
                "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Search",
                "BackgroundAppGlobalToggle",
                0,
                "background app toggle cleared",
            ),
        ],
        commands: vec![],
        requires_elevation: false,
    }
}

pub fn gpu_scheduling() -> Tweak {
    Tweak {
        id: TweakId::GpuScheduling,
        name: "Hardware GPU Scheduling",
        description: "Enables hardware-accelerated GPU scheduling. Takes effect after a \
                      reboot.",
        writes: vec![dword(
            Hklm,
            "SYSTEM\\CurrentControlSet\\Control\\GraphicsDrivers",
            "HwSchMode",
            2,
            "hardware GPU scheduling enabled",
        )],
        commands: vec![],
        requires_elevation: true,
    }
}

pub fn timer_resolution() -> Tweak {
    Tweak {
        id: TweakId::TimerResolution,
        name: "Optimize Timer Resolution",
        description: "Forces the platform tick and disables the dynamic tick for a \
                      steady timer interrupt rate. Takes effect after a reboot.",
        writes: vec![dword(
            Hklm,
            "SYSTEM\\CurrentControlSet\\Control\\Session Manager\\kernel",
            "GlobalTimerResolutionRequests",
            1,
            "global timer resolution requests enabled",
        )],
        commands: vec![
            CommandStep::new(
                "bcdedit",
                &["/set", "useplatformtick", "yes"],
                "platform tick enabled",
            ),
            CommandStep::new(
                "bcdedit",
                &["/set", "disabledynamictick", "yes"],
                "dynamic tick disabled",
            ),
        ],
        requires_elevation: true,
    }
}

pub fn disable_hpet() -> Tweak {
    Tweak {
        id: TweakId::DisableHpet,
        name: "Disable HPET",
        description: "Removes the forced platform clock so Windows falls back to the \
                      lower-latency TSC timer. Takes effect after a reboot.",
        writes: vec![],
        // The value being absent already means HPET is off, so a failed
        // delete is not an error.
        commands: vec![CommandStep::best_effort(
            "bcdedit",
            &["/deletevalue", "useplatformclock"],
            "forced platform clock removed",
        )],
        requires_elevation: true,
    }
}

pub fn disable_core_parking() -> Tweak {
    Tweak {
        id: TweakId::DisableCoreParking,
        name: "Disable Core Parking",
        description: "Keeps every CPU core unparked by raising the active scheme's \
                      minimum core count to 100%.",
        writes: vec![],
        commands: vec![
            CommandStep::new(
                "powercfg",
                &[
                    "-setacvalueindex",
                    "scheme_current",
                    "sub_processor",
                    "CPMINCORES",
                    "100",
                ],
                "minimum unparked cores set to 100%",
            ),
            // Re-activating the current scheme makes the index change stick.
            CommandStep::new(
                "powercfg",
                &["-setactive", "scheme_current"],
                "active scheme refreshed",
            ),
        ],
        requires_elevation: true,
    }
}

pub fn high_performance_power() -> Tweak {
    Tweak {
        id: TweakId::HighPerformancePower,
        name: "High Performance Power Plan",
        description: "Activates the built-in High performance power scheme. Laptops \
                      will drain faster.",
        writes: vec![ResourceWrite::set(
            ResourceRef::ActivePowerScheme,
            TypedValue::SchemeGuid(HIGH_PERFORMANCE_SCHEME.to_string()),
            "power plan set to High performance",
        )],
        // Some editions ship without the scheme; duplicating the template
        // recreates it.
        commands: vec![CommandStep::best_effort(
            "powercfg",
            &["-duplicatescheme", HIGH_PERFORMANCE_SCHEME],
            "high performance scheme ensured",
        )],
        requires_elevation: true,
    }
}

pub fn disable_services() -> Tweak {
    let (writes, commands) = disable_service_writes(&[
        "SysMain",
        "DiagTrack",
        "dmwappushservice",
        "WSearch",
        "TabletInputService",
        "Fax",
    ]);
    Tweak {
        id: TweakId::DisableServices,
        name: "Disable Unnecessary Services",
        description: "Disables prefetch, telemetry, search indexing and other \
                      non-essential services.",
        writes,
        commands,
        requires_elevation: true,
    }
}

pub fn disable_xbox_services() -> Tweak {
    let (writes, commands) = disable_service_writes(&[
        "XblAuthManager",
        "XblGameSave",
        "XboxNetApiSvc",
        "XboxGipSvc",
    ]);
    Tweak {
        id: TweakId::DisableXboxServices,
        name: "Disable Xbox Services",
        description: "Disables the Xbox service set. Game Pass and the Xbox app stop \
                      working until reverted.",
        writes,
        commands,
        requires_elevation: true,
    }
}

/// Catalog fallback values, applied only for resources with no snapshot
/// entry. Snapshot-based restore is the primary contract; these exist for
/// ledgers lost before this tool ever ran.
pub fn catalog_defaults() -> Vec<ResourceWrite> {
    vec![
        ResourceWrite::set(
            ResourceRef::ActivePowerScheme,
            TypedValue::SchemeGuid(BALANCED_SCHEME.to_string()),
            "power plan restored to Balanced",
        ),
        ResourceWrite::set(
            ResourceRef::service("SysMain"),
            TypedValue::StartMode(ServiceStartMode::Auto),
            "service 'SysMain' restored to auto start",
        ),
        ResourceWrite::set(
            ResourceRef::service("WSearch"),
            TypedValue::StartMode(ServiceStartMode::Auto),
            "service 'WSearch' restored to auto start",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_mode_touches_only_current_user() {
        for write in game_mode().writes {
            match write.resource {
                ResourceRef::RegistryValue { hive, .. } => assert_eq!(hive, Hkcu),
                other => panic!("unexpected resource {other}"),
            }
        }
    }

    #[test]
    fn network_latency_declares_writes_before_commands() {
        let tweak = network_latency();
        assert_eq!(tweak.writes.len(), 3);
        assert!(tweak.commands.iter().all(|c| c.program == "netsh"));
    }

    #[test]
    fn power_tweak_declares_the_active_scheme() {
        let tweak = high_performance_power();
        assert_eq!(tweak.writes[0].resource, ResourceRef::ActivePowerScheme);
        match &tweak.writes[0].value {
            Some(TypedValue::SchemeGuid(guid)) => assert_eq!(guid, HIGH_PERFORMANCE_SCHEME),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn core_parking_applies_then_refreshes_the_scheme() {
        let tweak = disable_core_parking();
        assert_eq!(tweak.commands.len(), 2);
        assert!(tweak.commands[0].command_line().ends_with("CPMINCORES 100"));
        assert_eq!(
            tweak.commands[1].command_line(),
            "powercfg -setactive scheme_current"
        );
    }

    #[test]
    fn hpet_delete_tolerates_an_already_absent_value() {
        let tweak = disable_hpet();
        assert!(tweak.commands.iter().all(|c| c.best_effort));
    }

    #[test]
    fn defaults_cover_only_resources_with_known_factory_state() {
        let defaults = catalog_defaults();
        assert!(defaults
            .iter()
            .any(|w| w.resource == ResourceRef::ActivePowerScheme));
        assert!(defaults.iter().all(|w| w.value.is_some()));
    }
}
