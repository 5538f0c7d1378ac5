//! Test-only saveset writer.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use vmsbackup::saveset::{ExtractOptions, MediumFormat};
use vmsbackup::session::SessionOptions;

pub const BS: usize = 2048;
pub const VBN: usize = 512;

const HEADER: usize = 256;
const RECORD_HEADER: usize = 16;

pub const FIX: u8 = 0x01;
pub const VAR: u8 = 0x02;
pub const VFC: u8 = 0x03;
pub const STMLF: u8 = 0x05;
pub const STMCR: u8 = 0x06;
pub const CR: u8 = 0x02;

pub fn items(list: &[(u16, &[u8])]) -> Vec<u8> {
    let mut out = vec![1u8, 1];
    for (code, data) in list {
        out.extend_from_slice(&(data.len() as u16).to_le_bytes());
        out.extend_from_slice(&code.to_le_bytes());
        out.extend_from_slice(data);
    }
    out
}

pub fn summary(name: &str) -> Vec<u8> {
    items(&[
        (1, name.as_bytes()),
        (2, b"BACKUP [USER...] MT:MYSET"),
        (4, b"SYSTEM"),
        (7, &0x0800u16.to_le_bytes()),
        (9, b"NODE1"),
        (13, &(BS as u32).to_le_bytes()),
    ])
}

/// File record for `len` bytes of raw content.
pub fn file_record(name: &str, format: u8, attrs: u8, record_size: u16, len: usize) -> Vec<u8> {
    let used = (len / VBN) as u32 + 1;
    let mut fat = [0u8; 32];
    fat[0] = format;
    fat[1] = attrs;
    fat[2..4].copy_from_slice(&record_size.to_le_bytes());
    fat[6..8].copy_from_slice(&(used as u16).to_le_bytes());
    fat[8..10].copy_from_slice(&((used >> 16) as u16).to_le_bytes());
    fat[10..12].copy_from_slice(&(used as u16).to_le_bytes());
    fat[12..14].copy_from_slice(&((len % VBN) as u16).to_le_bytes());
    items(&[(0x2a, name.as_bytes()), (0x34, &fat)])
}

/// Raw Variable-format stream: length word, data, pad to even.
pub fn var_stream(records: &[&[u8]]) -> Vec<u8> {
    let mut raw = Vec::new();
    for r in records {
        raw.extend_from_slice(&(r.len() as u16).to_le_bytes());
        raw.extend_from_slice(r);
        if raw.len() % 2 == 1 {
            raw.push(0);
        }
    }
    raw
}

/// Packs sub-records into fixed-size blocks.
pub struct SavesetWriter {
    name:    String,
    number:  u32,
    blocks:  Vec<Vec<u8>>,
    current: Vec<u8>,
}

impl SavesetWriter {
    pub fn new(name: &str) -> Self {
        let mut w = Self { name: name.into(), number: 1, blocks: Vec::new(), current: Vec::new() };
        w.record(1, &summary(name));
        w
    }

    fn header(&self, applic: u16) -> Vec<u8> {
        let mut h = vec![0u8; HEADER];
        h[0..2].copy_from_slice(&(HEADER as u16).to_le_bytes());
        h[2..4].copy_from_slice(&0x0800u16.to_le_bytes());
        h[6..8].copy_from_slice(&applic.to_le_bytes());
        h[8..12].copy_from_slice(&self.number.to_le_bytes());
        h[32..34].copy_from_slice(&1u16.to_le_bytes());
        h[34..36].copy_from_slice(&1u16.to_le_bytes());
        h[40..44].copy_from_slice(&(BS as u32).to_le_bytes());
        h[48] = self.name.len() as u8;
        h[49..49 + self.name.len()].copy_from_slice(self.name.as_bytes());
        h
    }

    pub fn record(&mut self, rtype: u16, payload: &[u8]) {
        if !self.current.is_empty() && self.current.len() + RECORD_HEADER + payload.len() > BS {
            self.flush();
        }
        if self.current.is_empty() {
            self.current = self.header(1);
        }
        self.current.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        self.current.extend_from_slice(&rtype.to_le_bytes());
        self.current.extend_from_slice(&[0u8; 12]);
        self.current.extend_from_slice(payload);
    }

    pub fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let mut block = std::mem::take(&mut self.current);
        block.resize(BS, 0);
        self.blocks.push(block);
        self.number += 1;
    }

    /// File record followed by its content in 512-byte VBN records.
    pub fn file(&mut self, name: &str, format: u8, attrs: u8, record_size: u16, content: &[u8]) {
        self.record(3, &file_record(name, format, attrs, record_size, content.len()));
        for chunk in content.chunks(VBN) {
            let mut vbn = chunk.to_vec();
            vbn.resize(VBN, 0);
            self.record(4, &vbn);
        }
    }

    pub fn xor_block(&mut self) {
        self.flush();
        let mut block = self.header(2);
        block.resize(BS, 0xA5);
        self.blocks.push(block);
        self.number += 1;
    }

    pub fn finish(mut self) -> Vec<Vec<u8>> {
        self.flush();
        self.blocks
    }
}

pub fn disk_image(blocks: &[Vec<u8>]) -> Vec<u8> {
    blocks.concat()
}

// ── SIMH tape ────────────────────────────────────────────────────────────────

pub struct TapeWriter {
    out: Vec<u8>,
}

impl TapeWriter {
    pub fn new() -> Self {
        Self { out: Vec::new() }
    }

    pub fn record(&mut self, data: &[u8]) {
        let len = (data.len() as u32).to_le_bytes();
        self.out.extend_from_slice(&len);
        self.out.extend_from_slice(data);
        if data.len() % 2 == 1 {
            self.out.push(0);
        }
        self.out.extend_from_slice(&len);
    }

    pub fn mark(&mut self) {
        self.out.extend_from_slice(&0u32.to_le_bytes());
    }

    pub fn saveset(&mut self, name: &str, number: u32, blocks: &[Vec<u8>]) {
        if self.out.is_empty() {
            self.record(&label(b"VOL1", &[(4, "TAPE01")]));
        }
        self.record(&label(b"HDR1", &[(4, name), (31, &format!("{number:04}"))]));
        self.record(&label(b"HDR2", &[(4, &format!("F{BS:05}"))]));
        self.mark();
        for b in blocks {
            self.record(b);
        }
        self.mark();
        self.record(&label(b"EOF1", &[(4, name)]));
        self.mark();
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.mark();
        self.out
    }
}

pub fn label(id: &[u8; 4], fields: &[(usize, &str)]) -> Vec<u8> {
    let mut rec = vec![b' '; 80];
    rec[..4].copy_from_slice(id);
    for (at, text) in fields {
        rec[*at..*at + text.len()].copy_from_slice(text.as_bytes());
    }
    rec
}

// ── Options ──────────────────────────────────────────────────────────────────

pub fn extract_opts(out: &Path) -> ExtractOptions {
    ExtractOptions {
        session: SessionOptions { block_size: BS, ..SessionOptions::default() },
        extract: true,
        output_dir: out.to_path_buf(),
        format: MediumFormat::Auto,
        ..ExtractOptions::default()
    }
}

pub fn write_image(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}
