use bytes::BytesMut;
use ember_protocol_core::{
    read_i32, read_varint, write_i32, write_varint, Packet, ProtocolError, ProtocolResult,
};

/// Maximum fork depth of a single top-level `InteractionChain` (§9 open
/// question, resolved: 8 forks deep).
pub const MAX_CHAIN_DEPTH: usize = 8;
/// Maximum total node count across an entire top-level chain, including every
/// nested fork (§9 open question, resolved: 256 nodes).
pub const MAX_CHAIN_NODES: usize = 256;

/// A node in an interaction chain: an action plus the forks it can branch
/// into. Recursive, but bounded by `MAX_CHAIN_DEPTH`/`MAX_CHAIN_NODES` on
/// decode so an attacker cannot force unbounded parse work (§9 design note).
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionChain {
    pub chain_id: i32,
    pub action_id: i32,
    pub new_forks: Vec<InteractionChain>,
}

impl InteractionChain {
    fn write(&self, buf: &mut BytesMut) {
        write_i32(buf, self.chain_id);
        write_i32(buf, self.action_id);
        write_varint(buf, self.new_forks.len() as i32);
        for fork in &self.new_forks {
            fork.write(buf);
        }
    }

    fn read(buf: &mut BytesMut, depth: usize, nodes_seen: &mut usize) -> ProtocolResult<Self> {
        if depth > MAX_CHAIN_DEPTH {
            return Err(ProtocolError::RecursionLimit("interaction chain depth"));
        }
        *nodes_seen += 1;
        if *nodes_seen > MAX_CHAIN_NODES {
            return Err(ProtocolError::RecursionLimit("interaction chain node count"));
        }

        let chain_id = read_i32(buf)?;
        let action_id = read_i32(buf)?;
        let fork_count = read_varint(buf)? as usize;
        if fork_count > MAX_CHAIN_NODES {
            return Err(ProtocolError::InvalidLength {
                field: "new_forks",
                len: fork_count,
                max: MAX_CHAIN_NODES,
            });
        }
        let mut new_forks = Vec::with_capacity(fork_count);
        for _ in 0..fork_count {
            new_forks.push(Self::read(buf, depth + 1, nodes_seen)?);
        }

        Ok(Self {
            chain_id,
            action_id,
            new_forks,
        })
    }

    fn wire_size(&self) -> usize {
        4 + 4
            + ember_protocol_core::varint_len(self.new_forks.len() as i32)
            + self.new_forks.iter().map(Self::wire_size).sum::<usize>()
    }
}

/// `SyncInteractionChains(290)`. Array of top-level `InteractionChain`s.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncInteractionChains {
    pub chains: Vec<InteractionChain>,
}

impl Packet for SyncInteractionChains {
    const ID: i32 = 290;

    fn computed_size(&self) -> usize {
        ember_protocol_core::varint_len(self.chains.len() as i32)
            + self.chains.iter().map(InteractionChain::wire_size).sum::<usize>()
    }

    fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        write_varint(buf, self.chains.len() as i32);
        for chain in &self.chains {
            chain.write(buf);
        }
        Ok(())
    }

    fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        let count = read_varint(buf)? as usize;
        if count > MAX_CHAIN_NODES {
            return Err(ProtocolError::InvalidLength {
                field: "chains",
                len: count,
                max: MAX_CHAIN_NODES,
            });
        }
        let mut chains = Vec::with_capacity(count);
        for _ in 0..count {
            let mut nodes_seen = 0;
            chains.push(InteractionChain::read(buf, 0, &mut nodes_seen)?);
        }
        Ok(Self { chains })
    }
}

/// `CancelInteractionChain(291)`. Fixed: the chain to cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelInteractionChain {
    pub chain_id: i32,
}

impl Packet for CancelInteractionChain {
    const ID: i32 = 291;

    fn computed_size(&self) -> usize {
        4
    }

    fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        write_i32(buf, self.chain_id);
        Ok(())
    }

    fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        Ok(Self {
            chain_id: read_i32(buf)?,
        })
    }
}

/// `PlayInteractionFor(292)`. Fixed: which entity plays which action of which chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayInteractionFor {
    pub entity_id: i32,
    pub chain_id: i32,
    pub action_id: i32,
}

impl Packet for PlayInteractionFor {
    const ID: i32 = 292;

    fn computed_size(&self) -> usize {
        12
    }

    fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        write_i32(buf, self.entity_id);
        write_i32(buf, self.chain_id);
        write_i32(buf, self.action_id);
        Ok(())
    }

    fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        Ok(Self {
            entity_id: read_i32(buf)?,
            chain_id: read_i32(buf)?,
            action_id: read_i32(buf)?,
        })
    }
}

/// `MountNPC(293)`. Fixed: rider mounts the given NPC entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountNPC {
    pub rider_entity_id: i32,
    pub mount_entity_id: i32,
}

impl Packet for MountNPC {
    const ID: i32 = 293;

    fn computed_size(&self) -> usize {
        8
    }

    fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        write_i32(buf, self.rider_entity_id);
        write_i32(buf, self.mount_entity_id);
        Ok(())
    }

    fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
        Ok(Self {
            rider_entity_id: read_i32(buf)?,
            mount_entity_id: read_i32(buf)?,
        })
    }
}

/// `DismountNPC(294)`. Zero payload — the session tracks which NPC (if any)
/// the player currently rides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DismountNPC;

impl Packet for DismountNPC {
    const ID: i32 = 294;

    fn computed_size(&self) -> usize {
        0
    }

    fn serialize(&self, _buf: &mut BytesMut) -> ProtocolResult<()> {
        Ok(())
    }

    fn deserialize(_buf: &mut BytesMut) -> ProtocolResult<Self> {
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(chain_id: i32) -> InteractionChain {
        InteractionChain {
            chain_id,
            action_id: 0,
            new_forks: Vec::new(),
        }
    }

    #[test]
    fn sync_interaction_chains_round_trips_nested_forks() {
        let packet = SyncInteractionChains {
            chains: vec![InteractionChain {
                chain_id: 1,
                action_id: 10,
                new_forks: vec![leaf(2), leaf(3)],
            }],
        };
        let mut buf = BytesMut::new();
        packet.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), packet.computed_size());
        assert_eq!(SyncInteractionChains::deserialize(&mut buf).unwrap(), packet);
    }

    #[test]
    fn chain_deeper_than_limit_is_rejected() {
        let mut chain = leaf(0);
        for i in 1..=(MAX_CHAIN_DEPTH as i32 + 2) {
            chain = InteractionChain {
                chain_id: i,
                action_id: 0,
                new_forks: vec![chain],
            };
        }
        let packet = SyncInteractionChains {
            chains: vec![chain],
        };
        let mut buf = BytesMut::new();
        packet.serialize(&mut buf).unwrap();
        let err = SyncInteractionChains::deserialize(&mut buf).unwrap_err();
        assert_eq!(err, ProtocolError::RecursionLimit("interaction chain depth"));
    }

    #[test]
    fn dismount_npc_is_zero_sized() {
        let packet = DismountNPC;
        let mut buf = BytesMut::new();
        packet.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), 0);
        assert_eq!(DismountNPC::deserialize(&mut buf).unwrap(), packet);
    }
}
