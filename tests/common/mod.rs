//! Database writer shared by the integration tests and benches

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::Path;

/// Builds database files in the on-disk layout
///
/// Ranges must be added in ascending order of their last address. Identical
/// records share one copy in the text blob.
#[derive(Default)]
pub struct DatabaseWriter {
    ranges: Vec<(u32, u32, u8)>,
    text: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl DatabaseWriter {
    pub fn new() -> Self {
        Self {
            text: vec![0u8; 1024],
            ..Default::default()
        }
    }

    /// Add a range ending at `last` (inclusive)
    pub fn add_range(&mut self, last: Ipv4Addr, record: &str) -> &mut Self {
        self.add_range_u32(u32::from(last), record)
    }

    pub fn add_range_u32(&mut self, last: u32, record: &str) -> &mut Self {
        assert!(record.len() <= u8::MAX as usize, "record too long");
        if let Some(&(prev, _, _)) = self.ranges.last() {
            assert!(last > prev, "ranges must be added in order");
        }
        let offset = match self.offsets.get(record) {
            Some(&offset) => offset,
            None => {
                let offset = self.text.len() as u32;
                self.text.extend_from_slice(record.as_bytes());
                self.offsets.insert(record.to_string(), offset);
                offset
            }
        };
        self.ranges.push((last, offset, record.len() as u8));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let text_offset = (4 + 1024 + 1024 + self.ranges.len() * 8) as u32;
        let mut out = Vec::with_capacity(text_offset as usize + self.text.len());
        out.extend_from_slice(&text_offset.to_be_bytes());
        for bucket in 0..256u32 {
            let first = self.ranges.partition_point(|&(last, _, _)| last < bucket << 24) as u32;
            out.extend_from_slice(&first.to_le_bytes());
        }
        for &(last, offset, length) in &self.ranges {
            out.extend_from_slice(&last.to_be_bytes());
            out.extend_from_slice(&offset.to_le_bytes()[..3]);
            out.push(length);
        }
        out.extend_from_slice(&self.text);
        out
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.build())
    }
}

/// Small database covering the whole address space
pub fn sample_database() -> Vec<u8> {
    let mut writer = DatabaseWriter::new();
    writer
        .add_range(Ipv4Addr::new(0, 255, 255, 255), "Reserved\t\t\t")
        .add_range(Ipv4Addr::new(1, 0, 0, 255), "AU\tQueensland\tBrisbane\t")
        .add_range(Ipv4Addr::new(8, 8, 7, 255), "US\tCalifornia\t\t")
        .add_range(
            Ipv4Addr::new(8, 8, 8, 255),
            "US\tCalifornia\tMountain View\t\tGoogle",
        )
        .add_range(
            Ipv4Addr::new(114, 114, 255, 255),
            "CN\tJiangsu\tNanjing\tChinaNet\t1\t32\t320100\t100017\t42\t",
        )
        .add_range(Ipv4Addr::new(223, 255, 255, 255), "Reserved\t\t\t")
        .add_range(Ipv4Addr::new(255, 0, 0, 255), "ZZ\tTop\tFirst\t")
        .add_range(Ipv4Addr::new(255, 255, 255, 255), "ZZ\tTop\tLast\t");
    writer.build()
}

/// Database with one range whose record names `country`
pub fn single_country(country: &str) -> Vec<u8> {
    let mut writer = DatabaseWriter::new();
    writer.add_range_u32(u32::MAX, &format!("{}\tRegion\tCity\t", country));
    writer.build()
}
