//! PNG grammar
//!
//! Parses the PNG container into records: signature, the mandatory IHDR
//! header and the chunk list. PLTE, tEXt, gAMA, pHYs and tIME bodies are
//! decoded; every other chunk body (IDAT in particular) stays a blob.
//! CRCs are read but not verified.
//!
//! Layout (all integers big-endian):
//! - 8 bytes: signature `89 50 4E 47 0D 0A 1A 0A`
//! - 4 bytes length, 4 bytes type `IHDR`, 13 bytes header, 4 bytes CRC
//! - chunks: length, type, body, CRC; until `IEND` or end of input

use crate::adapter::{FieldOffsets, Grammar, Record, Schema, SourceRange, Value};
use crate::descriptor::FormatDescriptor;
use crate::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;
use std::sync::Arc;

/// PNG file signature
pub const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];

const IHDR_LEN: u32 = 13;

const DESCRIPTOR: &str = r#"
meta:
  id: png
  title: PNG (Portable Network Graphics) file
  file-extension: png
  endian: be
"#;

/// Enumeration names for the IHDR color type
fn color_type_name(value: u8) -> Option<&'static str> {
    match value {
        0 => Some("greyscale"),
        2 => Some("truecolor"),
        3 => Some("indexed"),
        4 => Some("greyscale_alpha"),
        6 => Some("truecolor_alpha"),
        _ => None,
    }
}

fn phys_unit_name(value: u8) -> Option<&'static str> {
    match value {
        0 => Some("unknown"),
        1 => Some("meter"),
        _ => None,
    }
}

/// Enumerated value, or the bare number when the grammar has no name for it
fn enum_or_number(value: u8, name: Option<&'static str>) -> Value<'static> {
    match name {
        Some(name) => Value::enumerated(name, i64::from(value)),
        None => Value::from(value),
    }
}

struct Schemas {
    png: Arc<Schema>,
    ihdr: Arc<Schema>,
    chunk: Arc<Schema>,
    plte: Arc<Schema>,
    rgb: Arc<Schema>,
    text: Arc<Schema>,
    gama: Arc<Schema>,
    phys: Arc<Schema>,
    time: Arc<Schema>,
}

impl Schemas {
    fn new() -> Self {
        Self {
            png: Schema::new("png")
                .stored("magic")
                .stored("ihdr_len")
                .stored("ihdr_type")
                .stored("ihdr")
                .stored("ihdr_crc")
                .stored("chunks")
                .build(),
            ihdr: Schema::new("ihdr_chunk")
                .stored("width")
                .stored("height")
                .stored("bit_depth")
                .stored("color_type")
                .stored("compression_method")
                .stored("filter_method")
                .stored("interlace_method")
                .build(),
            chunk: Schema::new("chunk")
                .stored("len")
                .stored("type")
                .stored("body")
                .stored("crc")
                .computed("is_critical", |chunk| {
                    let critical = match chunk.get("type") {
                        Some(Value::Str(t)) => t.starts_with(|c: char| c.is_ascii_uppercase()),
                        _ => false,
                    };
                    Ok(Value::Bool(critical))
                })
                .build(),
            plte: Schema::new("plte_chunk").stored("entries").build(),
            rgb: Schema::new("rgb").stored("r").stored("g").stored("b").build(),
            text: Schema::new("text_chunk").stored("keyword").stored("text").build(),
            gama: Schema::new("gama_chunk")
                .stored("gamma_int")
                .computed("gamma_ratio", |gama| {
                    let gamma = gama.get_uint("gamma_int")?;
                    if gamma == 0 {
                        return Ok(Value::Absent);
                    }
                    Ok(Value::Float(100_000.0 / gamma as f64))
                })
                .build(),
            phys: Schema::new("phys_chunk")
                .stored("pixels_per_unit_x")
                .stored("pixels_per_unit_y")
                .stored("unit")
                .build(),
            time: Schema::new("time_chunk")
                .stored("year")
                .stored("month")
                .stored("day")
                .stored("hour")
                .stored("minute")
                .stored("second")
                .build(),
        }
    }
}

/// Big-endian reader that reports the source range of every read
struct Reader<'a> {
    cursor: Cursor<&'a [u8]>,
    base: u64,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], base: u64) -> Self {
        Self {
            cursor: Cursor::new(data),
            base,
        }
    }

    fn pos(&self) -> u64 {
        self.base + self.cursor.position()
    }

    fn remaining(&self) -> usize {
        let data = self.cursor.get_ref();
        data.len().saturating_sub(self.cursor.position() as usize)
    }

    fn is_eof(&self) -> bool {
        self.remaining() == 0
    }

    fn truncated(&self, what: &str) -> Error {
        Error::Parse(format!("unexpected end of input reading {} at offset {}", what, self.pos()))
    }

    fn range_from(&self, start: u64) -> Result<SourceRange> {
        SourceRange::new(start, self.pos())
    }

    fn u8(&mut self, what: &str) -> Result<(u8, SourceRange)> {
        let start = self.pos();
        let value = self.cursor.read_u8().map_err(|_| self.truncated(what))?;
        Ok((value, self.range_from(start)?))
    }

    fn u16(&mut self, what: &str) -> Result<(u16, SourceRange)> {
        let start = self.pos();
        let value = self.cursor.read_u16::<BigEndian>().map_err(|_| self.truncated(what))?;
        Ok((value, self.range_from(start)?))
    }

    fn u32(&mut self, what: &str) -> Result<(u32, SourceRange)> {
        let start = self.pos();
        let value = self.cursor.read_u32::<BigEndian>().map_err(|_| self.truncated(what))?;
        Ok((value, self.range_from(start)?))
    }

    fn bytes(&mut self, len: usize, what: &str) -> Result<(&'a [u8], SourceRange)> {
        if self.remaining() < len {
            return Err(self.truncated(what));
        }
        let start = self.pos();
        let offset = self.cursor.position() as usize;
        let data: &'a [u8] = *self.cursor.get_ref();
        let slice = &data[offset..offset + len];
        self.cursor.set_position((offset + len) as u64);
        Ok((slice, self.range_from(start)?))
    }
}

/// Decode ISO-8859-1 text as used by tEXt chunks
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Built-in PNG grammar
pub struct PngGrammar {
    descriptor: FormatDescriptor,
    schemas: Schemas,
}

impl PngGrammar {
    pub fn new() -> Result<Self> {
        Ok(Self {
            descriptor: FormatDescriptor::from_yaml(DESCRIPTOR)?,
            schemas: Schemas::new(),
        })
    }

    fn parse_ihdr(&self, reader: &mut Reader<'_>) -> Result<Record> {
        let mut ihdr = Record::builder(&self.schemas.ihdr);
        let (width, range) = reader.u32("ihdr.width")?;
        ihdr.set_at("width", width, range)?;
        let (height, range) = reader.u32("ihdr.height")?;
        ihdr.set_at("height", height, range)?;
        let (bit_depth, range) = reader.u8("ihdr.bit_depth")?;
        ihdr.set_at("bit_depth", bit_depth, range)?;
        let (color_type, range) = reader.u8("ihdr.color_type")?;
        ihdr.set_at("color_type", enum_or_number(color_type, color_type_name(color_type)), range)?;
        let (compression, range) = reader.u8("ihdr.compression_method")?;
        ihdr.set_at("compression_method", compression, range)?;
        let (filter, range) = reader.u8("ihdr.filter_method")?;
        ihdr.set_at("filter_method", filter, range)?;
        let (interlace, range) = reader.u8("ihdr.interlace_method")?;
        ihdr.set_at("interlace_method", interlace, range)?;
        Ok(ihdr.finish())
    }

    fn parse_chunk(&self, reader: &mut Reader<'_>) -> Result<Record> {
        let mut chunk = Record::builder(&self.schemas.chunk);

        let (len, range) = reader.u32("chunk.len")?;
        chunk.set_at("len", len, range)?;

        let (kind, range) = reader.bytes(4, "chunk.type")?;
        let kind = latin1(kind);
        chunk.set_at("type", kind.clone(), range)?;

        let (body, range) = reader.bytes(len as usize, "chunk.body")?;
        let mut body_reader = Reader::new(body, range.start());
        let parsed = match kind.as_str() {
            "PLTE" => Some(self.parse_plte(&mut body_reader)?),
            "tEXt" => Some(self.parse_text(&mut body_reader)?),
            "gAMA" => Some(self.parse_gama(&mut body_reader)?),
            "pHYs" => Some(self.parse_phys(&mut body_reader)?),
            "tIME" => Some(self.parse_time(&mut body_reader)?),
            _ => None,
        };
        match parsed {
            Some(record) => chunk.set_at("body", Value::node(record), range)?,
            None => chunk.set_at("body", Value::blob(body.to_vec()), range)?,
        };

        let (crc, range) = reader.bytes(4, "chunk.crc")?;
        chunk.set_at("crc", Value::bytes(crc.to_vec()), range)?;

        Ok(chunk.finish())
    }

    fn parse_plte(&self, reader: &mut Reader<'_>) -> Result<Record> {
        let start = reader.pos();
        let mut entries = Vec::new();
        let mut ranges = Vec::new();
        while reader.remaining() >= 3 {
            let entry_start = reader.pos();
            let mut rgb = Record::builder(&self.schemas.rgb);
            for channel in ["r", "g", "b"] {
                let (value, range) = reader.u8("plte.entry")?;
                rgb.set_at(channel, value, range)?;
            }
            entries.push(Value::node(rgb.finish()));
            ranges.push(reader.range_from(entry_start)?);
        }

        let mut plte = Record::builder(&self.schemas.plte);
        plte.set("entries", Value::List(entries))?;
        plte.set_offsets(
            "entries",
            FieldOffsets::with_elements(reader.range_from(start)?, ranges),
        );
        Ok(plte.finish())
    }

    fn parse_text(&self, reader: &mut Reader<'_>) -> Result<Record> {
        let (body, range) = reader.bytes(reader.remaining(), "text")?;
        let split = body.iter().position(|&b| b == 0).ok_or_else(|| {
            Error::Parse(format!("tEXt chunk at offset {} has no keyword terminator", range.start()))
        })?;

        let mut text = Record::builder(&self.schemas.text);
        let keyword_range = SourceRange::new(range.start(), range.start() + split as u64)?;
        text.set_at("keyword", latin1(&body[..split]), keyword_range)?;
        let text_range = SourceRange::new(keyword_range.end() + 1, range.end())?;
        text.set_at("text", latin1(&body[split + 1..]), text_range)?;
        Ok(text.finish())
    }

    fn parse_gama(&self, reader: &mut Reader<'_>) -> Result<Record> {
        let mut gama = Record::builder(&self.schemas.gama);
        let (gamma, range) = reader.u32("gama.gamma_int")?;
        gama.set_at("gamma_int", gamma, range)?;
        Ok(gama.finish())
    }

    fn parse_phys(&self, reader: &mut Reader<'_>) -> Result<Record> {
        let mut phys = Record::builder(&self.schemas.phys);
        let (x, range) = reader.u32("phys.pixels_per_unit_x")?;
        phys.set_at("pixels_per_unit_x", x, range)?;
        let (y, range) = reader.u32("phys.pixels_per_unit_y")?;
        phys.set_at("pixels_per_unit_y", y, range)?;
        let (unit, range) = reader.u8("phys.unit")?;
        phys.set_at("unit", enum_or_number(unit, phys_unit_name(unit)), range)?;
        Ok(phys.finish())
    }

    fn parse_time(&self, reader: &mut Reader<'_>) -> Result<Record> {
        let mut time = Record::builder(&self.schemas.time);
        let (year, range) = reader.u16("time.year")?;
        time.set_at("year", year, range)?;
        for field in ["month", "day", "hour", "minute", "second"] {
            let (value, range) = reader.u8("time")?;
            time.set_at(field, value, range)?;
        }
        Ok(time.finish())
    }
}

impl Grammar for PngGrammar {
    fn descriptor(&self) -> &FormatDescriptor {
        &self.descriptor
    }

    fn parse(&self, data: &[u8]) -> Result<Record> {
        let mut reader = Reader::new(data, 0);
        let mut png = Record::builder(&self.schemas.png);

        let (magic, range) = reader.bytes(PNG_MAGIC.len(), "magic")?;
        if magic != PNG_MAGIC {
            return Err(Error::Parse(format!("not a PNG file: bad signature {}", hex::encode(magic))));
        }
        png.set_at("magic", Value::bytes(magic.to_vec()), range)?;

        let (ihdr_len, range) = reader.u32("ihdr_len")?;
        if ihdr_len != IHDR_LEN {
            return Err(Error::Parse(format!("IHDR length must be {}, found {}", IHDR_LEN, ihdr_len)));
        }
        png.set_at("ihdr_len", ihdr_len, range)?;

        let (ihdr_type, range) = reader.bytes(4, "ihdr_type")?;
        if ihdr_type != b"IHDR" {
            return Err(Error::Parse(format!("expected IHDR chunk, found {}", latin1(ihdr_type))));
        }
        png.set_at("ihdr_type", Value::bytes(ihdr_type.to_vec()), range)?;

        let start = reader.pos();
        let ihdr = self.parse_ihdr(&mut reader)?;
        png.set_at("ihdr", Value::node(ihdr), reader.range_from(start)?)?;

        let (crc, range) = reader.bytes(4, "ihdr_crc")?;
        png.set_at("ihdr_crc", Value::bytes(crc.to_vec()), range)?;

        let chunks_start = reader.pos();
        let mut chunks = Vec::new();
        let mut chunk_ranges = Vec::new();
        while !reader.is_eof() {
            let chunk_start = reader.pos();
            let chunk = self.parse_chunk(&mut reader)?;
            chunk_ranges.push(reader.range_from(chunk_start)?);
            let is_end = matches!(chunk.get("type"), Some(Value::Str(t)) if t == "IEND");
            chunks.push(Value::node(chunk));
            if is_end {
                break;
            }
        }
        tracing::debug!("Parsed PNG with {} chunks", chunks.len());

        png.set("chunks", Value::List(chunks))?;
        png.set_offsets(
            "chunks",
            FieldOffsets::with_elements(reader.range_from(chunks_start)?, chunk_ranges),
        );
        Ok(png.finish())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapter::ParseNode;
    use crate::policy::BlobPolicy;
    use crate::serializer::{Layout, TreeSerializer};
    use crate::sink::{MemorySink, StoredPayload};

    fn chunk(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        out
    }

    /// Small PNG: 2x1 indexed image with a palette, a text chunk and an IDAT
    pub(crate) fn sample_png(idat_len: usize) -> Vec<u8> {
        let mut data = PNG_MAGIC.to_vec();
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&2u32.to_be_bytes());
        ihdr.extend_from_slice(&1u32.to_be_bytes());
        ihdr.extend_from_slice(&[8, 3, 0, 0, 0]);
        data.extend(chunk(b"IHDR", &ihdr));
        data.extend(chunk(b"PLTE", &[255, 0, 0, 0, 0, 255]));
        data.extend(chunk(b"tEXt", b"Title\0Hello"));
        data.extend(chunk(b"gAMA", &45455u32.to_be_bytes()));
        data.extend(chunk(b"IDAT", &vec![0xab; idat_len]));
        data.extend(chunk(b"IEND", &[]));
        data
    }

    fn grammar() -> PngGrammar {
        PngGrammar::new().unwrap()
    }

    #[test]
    fn test_descriptor() {
        let grammar = grammar();
        assert_eq!(grammar.descriptor().id, "png");
        assert_eq!(grammar.descriptor().plugin_name(), "Png_portable_network_graphics_file");
    }

    #[test]
    fn test_parse_structure() {
        let root = grammar().parse(&sample_png(4)).unwrap();
        assert_eq!(root.type_name(), "png");
        assert_eq!(root.get_uint("ihdr_len").unwrap(), 13);

        match root.get("chunks") {
            Some(Value::List(chunks)) => assert_eq!(chunks.len(), 5),
            other => panic!("unexpected {:?}", other),
        }

        let offsets = root.offsets().unwrap();
        assert_eq!(offsets.get("magic").unwrap().range, SourceRange::new(0, 8).unwrap());
        assert_eq!(offsets.get("ihdr").unwrap().range, SourceRange::new(16, 29).unwrap());
        assert_eq!(offsets.get("chunks").unwrap().elements.len(), 5);
    }

    #[test]
    fn test_document() {
        let root = grammar().parse(&sample_png(4)).unwrap();
        let mut sink = MemorySink::with_range_references();
        let json = TreeSerializer::new(BlobPolicy::new(16, 1000).unwrap())
            .with_layout(Layout::Compact)
            .to_json_string(&root, &mut sink)
            .unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(doc["magic"], serde_json::json!([137, 80, 78, 71, 13, 10, 26, 10]));
        assert_eq!(doc["ihdrLen"], 13);
        assert_eq!(doc["ihdr"]["width"], 2);
        assert_eq!(doc["ihdr"]["colorType"], serde_json::json!({"name": "INDEXED", "value": 3}));
        assert_eq!(doc["chunks"][0]["type"], "PLTE");
        assert_eq!(doc["chunks"][0]["isCritical"], true);
        assert_eq!(doc["chunks"][0]["body"]["entries"][1]["b"], 255);
        assert_eq!(doc["chunks"][1]["body"]["keyword"], "Title");
        assert_eq!(doc["chunks"][1]["body"]["text"], "Hello");
        assert_eq!(doc["chunks"][1]["isCritical"], false);
        let ratio = doc["chunks"][2]["body"]["gammaRatio"].as_f64().unwrap();
        assert!((ratio - 100_000.0 / 45455.0).abs() < 1e-9);
        assert_eq!(doc["chunks"][3]["body"], "abababab");
        assert_eq!(doc["chunks"][3]["crc"], serde_json::json!([222, 173, 190, 239]));
        assert_eq!(doc["chunks"][4]["type"], "IEND");
        assert_eq!(doc["chunks"][4]["body"], "");
        assert!(sink.requests().is_empty());
    }

    #[test]
    fn test_idat_offloaded_as_range() {
        let data = sample_png(200);
        let root = grammar().parse(&data).unwrap();
        let mut sink = MemorySink::with_range_references();
        let json = TreeSerializer::new(BlobPolicy::new(16, 1000).unwrap())
            .to_json_string(&root, &mut sink)
            .unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(
            doc["chunks"][3]["body"],
            "data block of size: 200 (stored as $.chunks.[3].body)"
        );
        let requests = sink.requests();
        assert_eq!(requests.len(), 1);
        match requests[0].payload {
            StoredPayload::Range(range) => {
                assert_eq!(range.len(), 200);
                let start = range.start() as usize;
                assert!(data[start..start + 200].iter().all(|&b| b == 0xab));
            }
            ref other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        let grammar = grammar();
        assert!(matches!(grammar.parse(b"GIF89a.."), Err(Error::Parse(_))));

        let mut truncated = sample_png(4);
        truncated.truncate(40);
        assert!(matches!(grammar.parse(&truncated), Err(Error::Parse(_))));

        let mut bad_len = sample_png(4);
        bad_len[11] = 14;
        assert!(matches!(grammar.parse(&bad_len), Err(Error::Parse(_))));
    }

    #[test]
    fn test_stops_at_iend() {
        let mut data = sample_png(4);
        data.extend_from_slice(b"trailing garbage");
        let root = grammar().parse(&data).unwrap();
        match root.get("chunks") {
            Some(Value::List(chunks)) => assert_eq!(chunks.len(), 5),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_color_type_is_numeric() {
        let mut data = sample_png(4);
        // color type byte: 8 magic + 8 length/type + 4 width + 4 height + 1 depth
        data[25] = 7;
        let root = grammar().parse(&data).unwrap();
        let json = TreeSerializer::new(BlobPolicy::default())
            .with_layout(Layout::Compact)
            .to_json_string(&root, &mut MemorySink::new())
            .unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(doc["ihdr"]["colorType"], 7);
    }
}
