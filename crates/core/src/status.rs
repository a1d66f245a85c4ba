//! Status enums shared by the record store, the orchestrator and the client.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table. The wire form is the
//! lowercase name.

use serde::{Deserialize, Serialize};

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up a variant by its database status ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// Lowercase wire name.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $wire, )+
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Upscale job lifecycle status, mirrored onto the photo.
    UpscaleStatus {
        Pending = 1 => "pending",
        Processing = 2 => "processing",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
    }
}

define_status_enum! {
    /// Orchestrator workflow run status.
    RunStatus {
        Queued = 1 => "queued",
        Running = 2 => "running",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
    }
}

impl UpscaleStatus {
    /// Statuses that count as "in flight" for admission control.
    pub const ACTIVE: [UpscaleStatus; 2] = [UpscaleStatus::Pending, UpscaleStatus::Processing];

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Ordering used by observers to reject out-of-order updates.
    ///
    /// Both terminal statuses share the highest rank.
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Whether the job state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: UpscaleStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Failed)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_lookup() {
        for status in [
            UpscaleStatus::Pending,
            UpscaleStatus::Processing,
            UpscaleStatus::Completed,
            UpscaleStatus::Failed,
        ] {
            assert_eq!(UpscaleStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(UpscaleStatus::from_id(0), None);
        assert_eq!(RunStatus::from_id(5), None);
    }

    #[test]
    fn serializes_as_lowercase_name() {
        let json = serde_json::to_string(&UpscaleStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        let parsed: UpscaleStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, UpscaleStatus::Failed);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [UpscaleStatus::Completed, UpscaleStatus::Failed] {
            for to in [
                UpscaleStatus::Pending,
                UpscaleStatus::Processing,
                UpscaleStatus::Completed,
                UpscaleStatus::Failed,
            ] {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn allowed_transitions() {
        assert!(UpscaleStatus::Pending.can_transition_to(UpscaleStatus::Processing));
        assert!(UpscaleStatus::Pending.can_transition_to(UpscaleStatus::Failed));
        assert!(UpscaleStatus::Processing.can_transition_to(UpscaleStatus::Completed));
        assert!(UpscaleStatus::Processing.can_transition_to(UpscaleStatus::Failed));
        assert!(!UpscaleStatus::Pending.can_transition_to(UpscaleStatus::Completed));
        assert!(!UpscaleStatus::Processing.can_transition_to(UpscaleStatus::Pending));
    }

    #[test]
    fn rank_never_orders_terminal_below_active() {
        assert!(UpscaleStatus::Pending.rank() < UpscaleStatus::Processing.rank());
        assert!(UpscaleStatus::Processing.rank() < UpscaleStatus::Completed.rank());
        assert_eq!(UpscaleStatus::Completed.rank(), UpscaleStatus::Failed.rank());
    }
}
