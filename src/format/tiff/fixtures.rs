//! In-memory TIFF builders for unit tests.
//!
//! Frames are synthetic marker-correct byte strings; nothing here decodes.

use super::tags::FieldType;

/// Abbreviated table stream: SOI, one DQT segment, EOI.
pub fn jpeg_tables() -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x43, 0x00];
    out.extend((1..=64).map(|i| i as u8));
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

/// A frame whose SOF directly follows SOI; `tag` makes frames distinguishable.
pub fn fake_frame(tag: u8) -> Vec<u8> {
    vec![
        0xFF, 0xD8, // SOI
        0xFF, 0xC0, 0x00, 0x0B, 0x08, 0x01, 0x00, 0x01, 0x00, 0x01, 0x01, 0x11, 0x00, // SOF0
        0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00, // SOS
        tag, 0x5A, tag, // entropy data
        0xFF, 0xD9, // EOI
    ]
}

#[derive(Debug, Clone)]
pub struct DirectorySpec {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub frames: Vec<Vec<u8>>,
    /// Empty means no JPEGTables tag
    pub tables: Vec<u8>,
    pub compression: u16,
    pub photometric: u16,
    pub byte_count_type: FieldType,
    pub byte_count_override: Option<u64>,
}

impl DirectorySpec {
    /// A valid tiled JPEG directory with one distinct frame per tile.
    pub fn tiled(width: u32, height: u32, tile_size: u32) -> Self {
        let count = width.div_ceil(tile_size) * height.div_ceil(tile_size);
        DirectorySpec {
            width,
            height,
            tile_size,
            frames: (0..count).map(|i| fake_frame(i as u8)).collect(),
            tables: jpeg_tables(),
            compression: 7,
            photometric: 6,
            byte_count_type: FieldType::Long,
            byte_count_override: None,
        }
    }
}

pub struct TiffFixture {
    big_endian: bool,
    bigtiff: bool,
    directories: Vec<DirectorySpec>,
}

struct Entry {
    tag: u16,
    field_type: FieldType,
    count: u64,
    data: Vec<u8>,
}

impl TiffFixture {
    pub fn new() -> Self {
        TiffFixture {
            big_endian: false,
            bigtiff: false,
            directories: Vec::new(),
        }
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn bigtiff(mut self) -> Self {
        self.bigtiff = true;
        self
    }

    pub fn directory(mut self, spec: DirectorySpec) -> Self {
        self.directories.push(spec);
        self
    }

    fn encode(&self, field_type: FieldType, values: &[u64]) -> Vec<u8> {
        let mut out = Vec::new();
        for &v in values {
            match field_type.size_in_bytes() {
                1 => out.push(v as u8),
                2 => out.extend(if self.big_endian {
                    (v as u16).to_be_bytes().to_vec()
                } else {
                    (v as u16).to_le_bytes().to_vec()
                }),
                4 => out.extend(if self.big_endian {
                    (v as u32).to_be_bytes().to_vec()
                } else {
                    (v as u32).to_le_bytes().to_vec()
                }),
                _ => out.extend(if self.big_endian {
                    v.to_be_bytes().to_vec()
                } else {
                    v.to_le_bytes().to_vec()
                }),
            }
        }
        out
    }

    fn word(&self, value: u64) -> Vec<u8> {
        let ft = if self.bigtiff {
            FieldType::Long8
        } else {
            FieldType::Long
        };
        self.encode(ft, &[value])
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(if self.big_endian { b"MM" } else { b"II" });
        if self.bigtiff {
            out.extend(self.encode(FieldType::Short, &[43, 8, 0]));
            out.extend(self.encode(FieldType::Long8, &[0]));
        } else {
            out.extend(self.encode(FieldType::Short, &[42]));
            out.extend(self.encode(FieldType::Long, &[0]));
        }
        let first_ifd_field = out.len() - if self.bigtiff { 8 } else { 4 };

        let offset_type = if self.bigtiff {
            FieldType::Long8
        } else {
            FieldType::Long
        };
        let inline_size = if self.bigtiff { 8 } else { 4 };

        let mut next_fields = vec![first_ifd_field];
        for spec in &self.directories {
            let mut offsets = Vec::new();
            for frame in &spec.frames {
                offsets.push(out.len() as u64);
                out.extend_from_slice(frame);
            }
            let counts: Vec<u64> = spec
                .frames
                .iter()
                .map(|f| spec.byte_count_override.unwrap_or(f.len() as u64))
                .collect();

            let mut entries = vec![
                Entry::values(self.encode(FieldType::Long, &[spec.width as u64]), 256, FieldType::Long, 1),
                Entry::values(self.encode(FieldType::Long, &[spec.height as u64]), 257, FieldType::Long, 1),
                Entry::values(self.encode(FieldType::Short, &[8, 8, 8]), 258, FieldType::Short, 3),
                Entry::values(self.encode(FieldType::Short, &[spec.compression as u64]), 259, FieldType::Short, 1),
                Entry::values(self.encode(FieldType::Short, &[spec.photometric as u64]), 262, FieldType::Short, 1),
                Entry::values(self.encode(FieldType::Short, &[3]), 277, FieldType::Short, 1),
                Entry::values(self.encode(FieldType::Short, &[1]), 284, FieldType::Short, 1),
                Entry::values(self.encode(FieldType::Short, &[spec.tile_size as u64]), 322, FieldType::Short, 1),
                Entry::values(self.encode(FieldType::Short, &[spec.tile_size as u64]), 323, FieldType::Short, 1),
                Entry::values(self.encode(offset_type, &offsets), 324, offset_type, offsets.len() as u64),
                Entry::values(
                    self.encode(spec.byte_count_type, &counts),
                    325,
                    spec.byte_count_type,
                    counts.len() as u64,
                ),
            ];
            if !spec.tables.is_empty() {
                entries.push(Entry::values(
                    spec.tables.clone(),
                    347,
                    FieldType::Undefined,
                    spec.tables.len() as u64,
                ));
            }

            // Spill out-of-line values, remembering where each one went
            let mut value_fields = Vec::new();
            for entry in &entries {
                if entry.data.len() <= inline_size {
                    let mut field = entry.data.clone();
                    field.resize(inline_size, 0);
                    value_fields.push(field);
                } else {
                    if out.len() % 2 == 1 {
                        out.push(0);
                    }
                    value_fields.push(self.word(out.len() as u64));
                    out.extend_from_slice(&entry.data);
                }
            }

            if out.len() % 2 == 1 {
                out.push(0);
            }
            let ifd_offset = out.len() as u64;
            let patch_at = next_fields[next_fields.len() - 1];
            let patch = self.word(ifd_offset);
            out[patch_at..patch_at + patch.len()].copy_from_slice(&patch);

            if self.bigtiff {
                out.extend(self.encode(FieldType::Long8, &[entries.len() as u64]));
            } else {
                out.extend(self.encode(FieldType::Short, &[entries.len() as u64]));
            }
            for (entry, field) in entries.iter().zip(value_fields) {
                out.extend(self.encode(FieldType::Short, &[entry.tag as u64]));
                out.extend(self.encode(FieldType::Short, &[entry.field_type as u64]));
                out.extend(self.word(entry.count));
                out.extend(field);
            }
            next_fields.push(out.len());
            out.extend(self.word(0));
        }

        out
    }
}

impl Entry {
    fn values(data: Vec<u8>, tag: u16, field_type: FieldType, count: u64) -> Self {
        Entry {
            tag,
            field_type,
            count,
            data,
        }
    }
}
