//! Vtable layouts of the undocumented virtual desktop manager.
//!
//! The internal manager's interface id and method order change between
//! Windows builds. Each known layout is tried newest first; the first one
//! the shell answers for is used for the lifetime of the bridge.

/// Service id of the immersive shell (`CLSID_ImmersiveShell`).
pub const CLSID_IMMERSIVE_SHELL: u128 = 0xC2F03A33_21F5_47FA_B4BB_156362A2F239;

/// Service id under which the internal desktop manager is registered.
pub const SID_VIRTUAL_DESKTOP_MANAGER_INTERNAL: u128 = 0xC5E0CDCA_7B6E_41B2_9FC4_D93975CC467B;

/// `IApplicationViewCollection`; stable across supported builds.
pub const IID_APPLICATION_VIEW_COLLECTION: u128 = 0x1841C6D7_4F9D_42C0_AF41_8747538F10E5;

/// Slot of `IApplicationViewCollection::GetViewForHwnd`.
pub const GET_VIEW_FOR_HWND_SLOT: usize = 6;

/// One build family's `IVirtualDesktopManagerInternal` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalLayout {
    pub name: &'static str,
    pub iid: u128,
    /// Slot of `MoveViewToDesktop(view, desktop)`.
    pub move_view_slot: usize,
    /// Slot of `FindDesktop(&guid, &mut desktop)`.
    pub find_desktop_slot: usize,
}

/// Known layouts, newest build first.
pub const KNOWN_LAYOUTS: &[InternalLayout] = &[
    InternalLayout {
        name: "win11-24h2",
        iid: 0x53F5CA0B_158F_4124_900C_057158060B27,
        move_view_slot: 4,
        find_desktop_slot: 14,
    },
    InternalLayout {
        name: "win11-22h2",
        iid: 0xA3175F2D_239C_4BD2_8AA0_EEBA8B0B138E,
        move_view_slot: 4,
        find_desktop_slot: 13,
    },
    InternalLayout {
        name: "win10",
        iid: 0xF31574D6_B682_4CDC_BD56_1827860ABEC6,
        move_view_slot: 4,
        find_desktop_slot: 12,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_layouts_have_distinct_iids() {
        let iids: HashSet<u128> = KNOWN_LAYOUTS.iter().map(|l| l.iid).collect();
        assert_eq!(iids.len(), KNOWN_LAYOUTS.len());
        assert!(!iids.contains(&IID_APPLICATION_VIEW_COLLECTION));
    }

    #[test]
    fn test_slots_are_past_iunknown() {
        for layout in KNOWN_LAYOUTS {
            assert!(layout.move_view_slot >= 3, "{}", layout.name);
            assert!(layout.find_desktop_slot > layout.move_view_slot, "{}", layout.name);
        }
        assert!(GET_VIEW_FOR_HWND_SLOT >= 3);
    }

    #[test]
    fn test_newest_layout_first() {
        assert_eq!(KNOWN_LAYOUTS[0].name, "win11-24h2");
        assert_eq!(KNOWN_LAYOUTS[0].find_desktop_slot, 14);
        assert_eq!(KNOWN_LAYOUTS.last().map(|l| l.find_desktop_slot), Some(12));
    }
}
