//! Version-specific `.scm` header layout: variable space size, the model
//! table, main/mission sizes and offsets, and (San Andreas only) the
//! streamed-script table. Declarative binary layout via `binrw`, with a
//! one-byte packed flags field via `modular_bitfield`, matching how the
//! rest of this codebase describes wire structs.

use crate::options::HeaderVersion;
use binrw::{binrw, BinWrite};
use modular_bitfield::prelude::*;
use std::io::Cursor;

#[bitfield]
#[derive(Clone, Copy)]
pub struct ScriptFlags {
    pub is_mission: bool,
    pub is_streamed: bool,
    #[skip]
    __: B6,
}

impl From<ScriptFlags> for u8 {
    fn from(flags: ScriptFlags) -> Self {
        flags.into_bytes()[0]
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRecord {
    pub name: [u8; 24],
}

impl ModelRecord {
    pub fn new(name: &str) -> Self {
        let mut bytes = [0u8; 24];
        let src = name.as_bytes();
        let n = src.len().min(24);
        bytes[..n].copy_from_slice(&src[..n]);
        ModelRecord { name: bytes }
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionTable {
    pub largest_mission_size: u32,
    pub mission_count: u32,
    #[br(count = mission_count)]
    pub mission_offsets: Vec<u32>,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedScriptEntry {
    pub offset: u32,
    pub size: u32,
    pub name: [u8; 24],
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScmHeader {
    pub var_space_size: u32,
    pub model_count: u32,
    #[br(count = model_count)]
    pub models: Vec<ModelRecord>,
    pub main_size: u32,
    pub missions: MissionTable,
    pub streamed_count: u32,
    #[br(count = streamed_count)]
    pub streamed_scripts: Vec<StreamedScriptEntry>,
}

impl ScmHeader {
    /// Builds the header this toolchain would emit for the given option
    /// set. `streamed_scripts` is left empty for non-San-Andreas configs:
    /// `SPEC_FULL.md` §4.4 scopes the streamed-script table to `gtasa`.
    pub fn new(
        version: HeaderVersion,
        var_space_words: u32,
        models: Vec<ModelRecord>,
        main_size: u32,
        mission_offsets: Vec<u32>,
        largest_mission_size: u32,
        streamed_scripts: Vec<StreamedScriptEntry>,
    ) -> Self {
        let streamed_scripts = if matches!(version, HeaderVersion::GtaSa) { streamed_scripts } else { Vec::new() };
        ScmHeader {
            var_space_size: var_space_words * 4,
            model_count: models.len() as u32,
            models,
            main_size,
            missions: MissionTable {
                largest_mission_size,
                mission_count: mission_offsets.len() as u32,
                mission_offsets,
            },
            streamed_count: streamed_scripts.len() as u32,
            streamed_scripts,
        }
    }

    pub fn to_bytes(&self) -> std::io::Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_le(&mut cursor)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_through_binrw() {
        let header = ScmHeader::new(
            HeaderVersion::GtaSa,
            32,
            vec![ModelRecord::new("admiral")],
            1024,
            vec![2048, 4096],
            512,
            vec![],
        );
        let bytes = header.to_bytes().unwrap();
        assert!(bytes.len() > 20);
    }

    #[test]
    fn non_sa_configs_drop_the_streamed_table() {
        let header = ScmHeader::new(
            HeaderVersion::Gta3,
            16,
            vec![],
            512,
            vec![],
            0,
            vec![StreamedScriptEntry { offset: 0, size: 0, name: [0; 24] }],
        );
        assert_eq!(header.streamed_count, 0);
    }

    #[test]
    fn script_flags_pack_into_one_byte() {
        let mut flags = ScriptFlags::new();
        flags.set_is_mission(true);
        let byte: u8 = flags.into();
        assert_eq!(byte & 0b1, 1);
    }
}
