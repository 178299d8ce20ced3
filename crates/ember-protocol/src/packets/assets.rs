use bytes::BytesMut;
use ember_protocol_core::{
    read_byte_array, read_i32, read_string, read_u8, read_varint, write_byte_array, write_i32,
    write_string, write_u8, write_varint, Packet, ProtocolError, ProtocolResult,
};

/// Which change triggered this asset-sync envelope (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpdateKind {
    Init = 0,
    AddOrUpdate = 1,
    Remove = 2,
}

impl UpdateKind {
    fn from_u8(v: u8) -> ProtocolResult<Self> {
        match v {
            0 => Ok(Self::Init),
            1 => Ok(Self::AddOrUpdate),
            2 => Ok(Self::Remove),
            _ => Err(ProtocolError::BadEncoding("update_kind")),
        }
    }
}

const MAX_ASSET_ID_LEN: usize = 128;
const MAX_ASSET_PAYLOAD_LEN: usize = 8192;
const MAX_ASSET_ENTRIES: usize = 65536;

/// The key identifying one entry in an asset-sync envelope: either the id
/// string verbatim (types with no dense index, e.g. recipes) or a stable
/// small integer from the type's `IndexedLookupTable` (§4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetKey {
    StringKeyed(String),
    IndexKeyed(i32),
}

/// One entry of an asset-sync envelope. `data` is the asset's externally
/// serialized representation — the asset codec/schema system itself is out
/// of scope (§1); this crate only carries the bytes the asset loader already
/// produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry {
    pub key: AssetKey,
    pub data: Vec<u8>,
}

fn write_entry(buf: &mut BytesMut, entry: &AssetEntry) {
    match &entry.key {
        AssetKey::StringKeyed(id) => write_string(buf, id),
        AssetKey::IndexKeyed(idx) => write_varint(buf, *idx),
    }
    write_byte_array(buf, &entry.data);
}

fn read_entry(buf: &mut BytesMut, index_keyed: bool) -> ProtocolResult<AssetEntry> {
    let key = if index_keyed {
        AssetKey::IndexKeyed(read_varint(buf)?)
    } else {
        AssetKey::StringKeyed(read_string(buf, "asset_id", MAX_ASSET_ID_LEN)?)
    };
    let data = read_byte_array(buf, "asset_data", MAX_ASSET_PAYLOAD_LEN)?;
    Ok(AssetEntry { key, data })
}

fn entry_wire_size(entry: &AssetEntry) -> usize {
    let key_size = match &entry.key {
        AssetKey::StringKeyed(id) => ember_protocol_core::string_len(id),
        AssetKey::IndexKeyed(idx) => ember_protocol_core::varint_len(*idx),
    };
    key_size + ember_protocol_core::varint_len(entry.data.len() as i32) + entry.data.len()
}

/// The generic envelope body shared by every `UpdateAssets*` packet:
/// `kind` + `max_index` hint + payload array. One concrete packet type per
/// asset type (distinct wire ids), generated by `define_asset_update_packet!`
/// below, since `Packet::ID` must be a per-type constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAssetsBody {
    pub kind: UpdateKind,
    pub max_index: i32,
    pub entries: Vec<AssetEntry>,
}

impl UpdateAssetsBody {
    pub fn computed_size(&self) -> usize {
        1 + 4
            + ember_protocol_core::varint_len(self.entries.len() as i32)
            + self.entries.iter().map(entry_wire_size).sum::<usize>()
    }

    pub fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        write_u8(buf, self.kind as u8);
        write_i32(buf, self.max_index);
        write_varint(buf, self.entries.len() as i32);
        for entry in &self.entries {
            write_entry(buf, entry);
        }
        Ok(())
    }

    pub fn deserialize(buf: &mut BytesMut, index_keyed: bool) -> ProtocolResult<Self> {
        let kind = UpdateKind::from_u8(read_u8(buf)?)?;
        let max_index = read_i32(buf)?;
        let count = read_varint(buf)? as usize;
        if count > MAX_ASSET_ENTRIES {
            return Err(ProtocolError::InvalidLength {
                field: "entries",
                len: count,
                max: MAX_ASSET_ENTRIES,
            });
        }
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            entries.push(read_entry(buf, index_keyed)?);
        }
        Ok(Self {
            kind,
            max_index,
            entries,
        })
    }
}

/// Defines one `UpdateAssets*` packet type for a managed asset type, fixing
/// its wire id and whether its entries are index-keyed or string-keyed.
macro_rules! define_asset_update_packet {
    ($name:ident, $id:expr, index_keyed: $index_keyed:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub body: UpdateAssetsBody,
        }

        impl Packet for $name {
            const ID: i32 = $id;

            fn computed_size(&self) -> usize {
                self.body.computed_size()
            }

            fn serialize(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
                self.body.serialize(buf)
            }

            fn deserialize(buf: &mut BytesMut) -> ProtocolResult<Self> {
                Ok(Self {
                    body: UpdateAssetsBody::deserialize(buf, $index_keyed)?,
                })
            }
        }
    };
}

define_asset_update_packet!(UpdateAssetsItems, 100, index_keyed: true);
define_asset_update_packet!(UpdateAssetsItemQualities, 101, index_keyed: true);
define_asset_update_packet!(UpdateAssetsItemReticles, 102, index_keyed: true);
define_asset_update_packet!(UpdateAssetsRecipes, 103, index_keyed: false);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_keyed_envelope_round_trips() {
        let packet = UpdateAssetsItems {
            body: UpdateAssetsBody {
                kind: UpdateKind::AddOrUpdate,
                max_index: 2,
                entries: vec![AssetEntry {
                    key: AssetKey::IndexKeyed(2),
                    data: vec![1, 2, 3],
                }],
            },
        };
        let mut buf = BytesMut::new();
        packet.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), packet.computed_size());
        assert_eq!(UpdateAssetsItems::deserialize(&mut buf).unwrap(), packet);
    }

    #[test]
    fn string_keyed_envelope_round_trips() {
        let packet = UpdateAssetsRecipes {
            body: UpdateAssetsBody {
                kind: UpdateKind::Init,
                max_index: 0,
                entries: vec![AssetEntry {
                    key: AssetKey::StringKeyed("core:plank_table".into()),
                    data: vec![],
                }],
            },
        };
        let mut buf = BytesMut::new();
        packet.serialize(&mut buf).unwrap();
        assert_eq!(UpdateAssetsRecipes::deserialize(&mut buf).unwrap(), packet);
    }
}
