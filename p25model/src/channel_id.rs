use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use utoipa::ToSchema;

/// Source unit id used when a grant does not name its originator.
pub const UNIT_ID_NONE: i32 = 0;

const QUALIFY_NETWORK_FIELD: i32 = -1;

/// Which sweep timer supervises a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Control,
    Traffic,
}

/// Identity of a control channel: network, system, RF subsystem and site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct ControlChannelId {
    pub wacn: i32,
    pub system_id: i32,
    pub rf_subsystem_id: i32,
    pub site_id: i32,
}

impl ControlChannelId {
    pub fn new(wacn: i32, system_id: i32, rf_subsystem_id: i32, site_id: i32) -> Self {
        Self {
            wacn,
            system_id,
            rf_subsystem_id,
            site_id,
        }
    }
}

/// Identity of a unit-to-unit traffic channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct DirectChannelId {
    pub wacn: i32,
    pub system_id: i32,
    pub rf_subsystem_id: i32,
    pub source_id: i32,
    pub destination_id: i32,
}

/// Identity of a talk-group traffic channel.
///
/// The source unit is informative only: grants for the same group on the same
/// frequency are the same channel whoever keyed up, so `source_id` never takes
/// part in [`ChannelId`] equality or hashing. Use [`UNIT_ID_NONE`] when the
/// source is unknown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct GroupChannelId {
    pub wacn: i32,
    pub system_id: i32,
    pub rf_subsystem_id: i32,
    pub source_id: i32,
    pub group_id: i32,
    pub frequency: f64,
}

impl GroupChannelId {
    pub fn new(
        wacn: i32,
        system_id: i32,
        rf_subsystem_id: i32,
        source_id: i32,
        group_id: i32,
        frequency: f64,
    ) -> Self {
        Self {
            wacn,
            system_id,
            rf_subsystem_id,
            source_id,
            group_id,
            frequency,
        }
    }
}

/// Identity of a short lived qualification probe, keyed by frequency only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct QualifyChannelId {
    pub frequency: f64,
}

/// Logical key under which a channel lease is registered.
///
/// Equality is structural and the variant is part of the key: a control
/// channel and a traffic channel never compare equal even when their network
/// fields do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelId {
    Control(ControlChannelId),
    TrafficDirect(DirectChannelId),
    TrafficGroup(GroupChannelId),
    Qualify(QualifyChannelId),
}

impl ChannelId {
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelId::Control(_) => ChannelKind::Control,
            ChannelId::TrafficDirect(_) | ChannelId::TrafficGroup(_) | ChannelId::Qualify(_) => {
                ChannelKind::Traffic
            }
        }
    }

    fn tag(&self) -> u8 {
        match self {
            ChannelId::Control(_) => 1,
            ChannelId::TrafficGroup(_) => 2,
            ChannelId::TrafficDirect(_) => 3,
            ChannelId::Qualify(_) => 4,
        }
    }

    /// (wacn, system, rf subsystem); qualify probes report -1 for each.
    pub fn network(&self) -> (i32, i32, i32) {
        match self {
            ChannelId::Control(c) => (c.wacn, c.system_id, c.rf_subsystem_id),
            ChannelId::TrafficDirect(d) => (d.wacn, d.system_id, d.rf_subsystem_id),
            ChannelId::TrafficGroup(g) => (g.wacn, g.system_id, g.rf_subsystem_id),
            ChannelId::Qualify(_) => (
                QUALIFY_NETWORK_FIELD,
                QUALIFY_NETWORK_FIELD,
                QUALIFY_NETWORK_FIELD,
            ),
        }
    }
}

impl PartialEq for ChannelId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ChannelId::Control(a), ChannelId::Control(b)) => a == b,
            (ChannelId::TrafficDirect(a), ChannelId::TrafficDirect(b)) => a == b,
            // same group on the same frequency, source unit ignored
            (ChannelId::TrafficGroup(a), ChannelId::TrafficGroup(b)) => {
                a.wacn == b.wacn
                    && a.system_id == b.system_id
                    && a.rf_subsystem_id == b.rf_subsystem_id
                    && a.group_id == b.group_id
                    && a.frequency.to_bits() == b.frequency.to_bits()
            }
            (ChannelId::Qualify(a), ChannelId::Qualify(b)) => {
                a.frequency.to_bits() == b.frequency.to_bits()
            }
            _ => false,
        }
    }
}

impl Eq for ChannelId {}

impl Hash for ChannelId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tag().hash(state);
        match self {
            ChannelId::Control(c) => c.hash(state),
            ChannelId::TrafficDirect(d) => d.hash(state),
            ChannelId::TrafficGroup(g) => {
                g.wacn.hash(state);
                g.system_id.hash(state);
                g.rf_subsystem_id.hash(state);
                g.group_id.hash(state);
                g.frequency.to_bits().hash(state);
            }
            ChannelId::Qualify(q) => q.frequency.to_bits().hash(state),
        }
    }
}

impl From<ControlChannelId> for ChannelId {
    fn from(id: ControlChannelId) -> Self {
        ChannelId::Control(id)
    }
}

impl From<GroupChannelId> for ChannelId {
    fn from(id: GroupChannelId) -> Self {
        ChannelId::TrafficGroup(id)
    }
}

impl From<DirectChannelId> for ChannelId {
    fn from(id: DirectChannelId) -> Self {
        ChannelId::TrafficDirect(id)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (wacn, system, rfss) = self.network();
        write!(f, "{}:{}:{}", wacn, system, rfss)?;
        match self {
            ChannelId::Control(c) => write!(f, ":{}", c.site_id),
            ChannelId::TrafficDirect(d) => write!(f, ":{}:{}", d.source_id, d.destination_id),
            ChannelId::TrafficGroup(g) => write!(f, ":{}:{}:{}", g.source_id, g.group_id, g.frequency),
            ChannelId::Qualify(q) => write!(f, ":{}", q.frequency),
        }
    }
}
