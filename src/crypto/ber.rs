//! BER to DER normalization for CMS messages
//!
//! Enveloped-data producers stream their output: indefinite lengths, and
//! octet strings split into constructed segments. The `der` decoders accept
//! neither, so a message is re-encoded with definite minimal lengths and
//! joined segments before it is parsed. A message that is already DER comes
//! out unchanged. SET OF ordering is left as sent.

use crate::error::{DownloadError, DownloadResult};

const MAX_DEPTH: usize = 64;

const CONSTRUCTED: u8 = 0x20;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_OID: u8 = 0x06;
const TAG_SEGMENTED_OCTET_STRING: u8 = 0x24;
const TAG_SEQUENCE: u8 = 0x30;
/// `[0] IMPLICIT OCTET STRING`, primitive and constructed
const TAG_CONTEXT_0: u8 = 0x80;
const TAG_CONTEXT_0_CONSTRUCTED: u8 = 0xA0;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Primitive { tag: Vec<u8>, value: Vec<u8> },
    Constructed { tag: Vec<u8>, children: Vec<Node> },
}

impl Node {
    fn tag(&self) -> &[u8] {
        match self {
            Self::Primitive { tag, .. } | Self::Constructed { tag, .. } => tag,
        }
    }

    fn has_tag(&self, tag: u8) -> bool {
        self.tag() == [tag].as_slice()
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Primitive { tag, value } => {
                out.extend_from_slice(tag);
                push_length(out, value.len());
                out.extend_from_slice(value);
            }
            Self::Constructed { tag, children } => {
                let mut body = Vec::new();
                for child in children {
                    child.encode(&mut body);
                }
                out.extend_from_slice(tag);
                push_length(out, body.len());
                out.extend_from_slice(&body);
            }
        }
    }
}

/// Re-encode a BER message as DER
pub fn to_der(input: &[u8]) -> DownloadResult<Vec<u8>> {
    let mut reader = Reader { input, pos: 0 };
    let node = reader.read_node(0)?;
    if reader.pos != input.len() {
        return Err(malformed("trailing data after message"));
    }

    let mut out = Vec::with_capacity(input.len());
    normalize(node).encode(&mut out);
    Ok(out)
}

struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn byte(&mut self) -> DownloadResult<u8> {
        let byte = *self
            .input
            .get(self.pos)
            .ok_or_else(|| malformed("truncated message"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, len: usize) -> DownloadResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| malformed("length exceeds message"))?;
        let bytes = &self.input[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn is_finished(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn at_end_of_contents(&self) -> bool {
        self.input.get(self.pos..self.pos + 2) == Some([0u8, 0u8].as_slice())
    }

    fn read_tag(&mut self) -> DownloadResult<Vec<u8>> {
        let first = self.byte()?;
        let mut tag = vec![first];
        if first & 0x1f == 0x1f {
            loop {
                let next = self.byte()?;
                tag.push(next);
                if next & 0x80 == 0 {
                    break;
                }
                if tag.len() > 6 {
                    return Err(malformed("tag number too large"));
                }
            }
        }
        Ok(tag)
    }

    /// `None` for the indefinite form
    fn read_length(&mut self) -> DownloadResult<Option<usize>> {
        let first = self.byte()?;
        if first < 0x80 {
            return Ok(Some(first as usize));
        }
        if first == 0x80 {
            return Ok(None);
        }
        let count = (first & 0x7f) as usize;
        if count > std::mem::size_of::<usize>() {
            return Err(malformed("length too large"));
        }
        let mut len = 0usize;
        for _ in 0..count {
            len = (len << 8) | self.byte()? as usize;
        }
        Ok(Some(len))
    }

    fn read_node(&mut self, depth: usize) -> DownloadResult<Node> {
        if depth > MAX_DEPTH {
            return Err(malformed("nesting too deep"));
        }
        let tag = self.read_tag()?;
        let constructed = tag[0] & CONSTRUCTED != 0;

        match (self.read_length()?, constructed) {
            (Some(len), false) => Ok(Node::Primitive {
                tag,
                value: self.take(len)?.to_vec(),
            }),
            (Some(len), true) => {
                let mut inner = Reader {
                    input: self.take(len)?,
                    pos: 0,
                };
                let mut children = Vec::new();
                while !inner.is_finished() {
                    children.push(inner.read_node(depth + 1)?);
                }
                Ok(Node::Constructed { tag, children })
            }
            (None, true) => {
                let mut children = Vec::new();
                while !self.at_end_of_contents() {
                    children.push(self.read_node(depth + 1)?);
                }
                self.pos += 2;
                Ok(Node::Constructed { tag, children })
            }
            (None, false) => Err(malformed("indefinite length on a primitive value")),
        }
    }
}

fn normalize(node: Node) -> Node {
    let (tag, children) = match node {
        Node::Constructed { tag, children } => (tag, children),
        primitive => return primitive,
    };
    let mut children: Vec<Node> = children.into_iter().map(normalize).collect();

    if tag.as_slice() == [TAG_SEGMENTED_OCTET_STRING] {
        if let Some(value) = join_segments(&children) {
            return Node::Primitive {
                tag: vec![TAG_OCTET_STRING],
                value,
            };
        }
    }

    // EncryptedContentInfo: { contentType OID, algorithm, [0] IMPLICIT OCTET STRING }
    let oid_led = children.first().is_some_and(|c| c.has_tag(TAG_OID));
    if tag.as_slice() == [TAG_SEQUENCE] && oid_led {
        children = children
            .into_iter()
            .enumerate()
            .map(|(i, child)| if i > 0 { join_implicit_octets(child) } else { child })
            .collect();
    }

    Node::Constructed { tag, children }
}

/// Contents of a segmented octet string, if every child is a plain segment
fn join_segments(children: &[Node]) -> Option<Vec<u8>> {
    let mut joined = Vec::new();
    for child in children {
        match child {
            Node::Primitive { tag, value } if tag.as_slice() == [TAG_OCTET_STRING] => {
                joined.extend_from_slice(value)
            }
            _ => return None,
        }
    }
    Some(joined)
}

fn join_implicit_octets(node: Node) -> Node {
    match node {
        Node::Constructed { tag, children } if tag.as_slice() == [TAG_CONTEXT_0_CONSTRUCTED] => {
            match join_segments(&children) {
                Some(value) => Node::Primitive {
                    tag: vec![TAG_CONTEXT_0],
                    value,
                },
                None => Node::Constructed { tag, children },
            }
        }
        other => other,
    }
}

fn push_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

fn malformed(reason: &str) -> DownloadError {
    DownloadError::Decryption(format!("malformed BER: {}", reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indefinite_length_becomes_definite() {
        let ber = [0x30, 0x80, 0x02, 0x01, 0x05, 0x00, 0x00];
        assert_eq!(to_der(&ber).unwrap(), vec![0x30, 0x03, 0x02, 0x01, 0x05]);
    }

    #[test]
    fn test_segmented_octet_string_is_joined() {
        let ber = [
            0x24, 0x80, 0x04, 0x02, 0xAA, 0xBB, 0x04, 0x01, 0xCC, 0x00, 0x00,
        ];
        assert_eq!(to_der(&ber).unwrap(), vec![0x04, 0x03, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_implicit_content_is_joined() {
        let ber = [
            0x30, 0x80, 0x06, 0x01, 0x2A, 0xA0, 0x80, 0x04, 0x01, 0x01, 0x04, 0x01, 0x02, 0x00,
            0x00, 0x00, 0x00,
        ];
        assert_eq!(
            to_der(&ber).unwrap(),
            vec![0x30, 0x07, 0x06, 0x01, 0x2A, 0x80, 0x02, 0x01, 0x02]
        );
    }

    #[test]
    fn test_explicit_content_stays_constructed() {
        let ber = [
            0x30, 0x80, 0x06, 0x01, 0x2A, 0xA0, 0x80, 0x30, 0x03, 0x02, 0x01, 0x01, 0x00, 0x00,
            0x00, 0x00,
        ];
        assert_eq!(
            to_der(&ber).unwrap(),
            vec![0x30, 0x0A, 0x06, 0x01, 0x2A, 0xA0, 0x05, 0x30, 0x03, 0x02, 0x01, 0x01]
        );
    }

    #[test]
    fn test_long_lengths_are_minimal() {
        let mut ber = vec![0x24, 0x80, 0x04, 0x82, 0x00, 0xC8];
        ber.extend(std::iter::repeat(0x11).take(200));
        ber.extend([0x00, 0x00]);

        let der = to_der(&ber).unwrap();
        assert_eq!(&der[..3], &[0x04, 0x81, 0xC8]);
        assert_eq!(der.len(), 203);
    }

    #[test]
    fn test_der_passes_through() {
        let der = [
            0x30, 0x0A, 0x06, 0x01, 0x2A, 0xA0, 0x05, 0x30, 0x03, 0x02, 0x01, 0x01,
        ];
        assert_eq!(to_der(&der).unwrap(), der.to_vec());
    }

    #[test]
    fn test_malformed_input_is_rejected() {
        assert!(to_der(&[0x30, 0x80, 0x02, 0x01]).is_err());
        assert!(to_der(&[0x30, 0x80, 0x02, 0x01, 0x05]).is_err());
        assert!(to_der(&[0x02, 0x80, 0x00, 0x00]).is_err());
        assert!(to_der(&[0x02, 0x01, 0x05, 0xFF]).is_err());
        assert!(to_der(&[0x04, 0x05, 0x01]).is_err());
    }
}
