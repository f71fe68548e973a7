use std::collections::HashMap;
use std::fmt;

use super::packer::*;
use crate::error::*;

// NAME_LEN is the maximum length of a full domain name including the
// trailing dot.
const NAME_LEN: usize = 255;

// The maximum number of compression pointers followed while unpacking a
// single name. A legitimate message never chains anywhere near this many.
const MAX_PTR: usize = 10;

// A Name is a non-encoded domain name. It is used instead of strings to avoid
// allocations.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub(crate) struct Name {
    pub(crate) data: String,
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data)
    }
}

impl Name {
    pub(crate) fn new(data: &str) -> Result<Self> {
        if data.len() > NAME_LEN {
            Err(Error::ErrCalcLen)
        } else {
            Ok(Name {
                data: data.to_owned(),
            })
        }
    }

    // pack appends the wire format of the Name to msg.
    //
    // Domain names are a sequence of counted strings split at the dots. They
    // end with a zero-length string. Compression can be used to reuse domain
    // suffixes.
    //
    // The compression map will be updated with new domain suffixes. If
    // compression is None, compression will not be used.
    pub(crate) fn pack(
        &self,
        mut msg: Vec<u8>,
        compression: &mut Option<HashMap<String, usize>>,
        compression_off: usize,
    ) -> Result<Vec<u8>> {
        let data = self.data.as_bytes();

        // Add a trailing dot to canonicalize name.
        if data.is_empty() || data[data.len() - 1] != b'.' {
            return Err(Error::ErrNonCanonicalName);
        }

        // Allow root domain.
        if data == b"." {
            msg.push(0);
            return Ok(msg);
        }

        // Emit sequence of counted strings, chopping at dots.
        let mut begin = 0;
        for i in 0..data.len() {
            if data[i] == b'.' {
                if i == begin {
                    return Err(Error::ErrZeroSegLen);
                }
                if i - begin >= 1 << 6 {
                    // top two bits of length must be unset
                    return Err(Error::ErrSegTooLong);
                }

                // Check for existing suffixes to reuse as a pointer target,
                // and remember this suffix for later names to point at.
                if let Some(cmp) = compression {
                    if let Some(&ptr) = cmp.get(&self.data[begin..]) {
                        // Hit. Emit a pointer instead of the rest of the name.
                        return Ok(pack_uint16(msg, (ptr as u16) | 0xC000));
                    }

                    // Miss. Add the suffix to the compression table if the
                    // offset can be stored in the available 14 bits.
                    let off = msg.len() - compression_off;
                    if off < 1 << 14 {
                        cmp.insert(self.data[begin..].to_owned(), off);
                    }
                }

                msg.push((i - begin) as u8);
                msg.extend_from_slice(&data[begin..i]);
                begin = i + 1;
            }
        }

        msg.push(0);
        Ok(msg)
    }

    // unpack parses a wire-format name starting at msg[off], following
    // compression pointers.
    pub(crate) fn unpack(&mut self, msg: &[u8], off: usize) -> Result<usize> {
        self.unpack_compressed(msg, off, true)
    }

    pub(crate) fn unpack_compressed(
        &mut self,
        msg: &[u8],
        off: usize,
        allow_compression: bool,
    ) -> Result<usize> {
        // curr_off is the current working offset.
        let mut curr_off = off;

        // new_off is the offset where parsing should resume.
        let mut new_off = off;

        // ptr is the number of pointers followed.
        let mut ptr = 0;

        let mut name = String::with_capacity(NAME_LEN);
        loop {
            if curr_off >= msg.len() {
                return Err(Error::ErrBaseLen);
            }
            let c = msg[curr_off] as usize;
            curr_off += 1;
            match c & 0xC0 {
                // String segment
                0x00 => {
                    if c == 0x00 {
                        // A zero length signals the end of the name.
                        break;
                    }
                    let end_off = curr_off + c;
                    if end_off > msg.len() {
                        return Err(Error::ErrCalcLen);
                    }
                    name.push_str(&String::from_utf8_lossy(&msg[curr_off..end_off]));
                    name.push('.');
                    curr_off = end_off;
                }
                // Pointer
                0xC0 => {
                    if !allow_compression {
                        return Err(Error::ErrCompressedSrv);
                    }
                    if curr_off >= msg.len() {
                        return Err(Error::ErrInvalidPtr);
                    }
                    let c1 = msg[curr_off];
                    curr_off += 1;
                    if ptr == 0 {
                        new_off = curr_off;
                    }
                    // Don't follow a chain of pointers forever.
                    ptr += 1;
                    if ptr > MAX_PTR {
                        return Err(Error::ErrTooManyPtr);
                    }
                    curr_off = ((c ^ 0xC0) << 8) | (c1 as usize);
                }
                // Prefixes 0x80 and 0x40 are reserved.
                _ => return Err(Error::ErrReserved),
            }
        }

        if name.is_empty() {
            name.push('.');
        }
        if name.len() > NAME_LEN {
            return Err(Error::ErrCalcLen);
        }
        self.data = name;
        if ptr == 0 {
            new_off = curr_off;
        }
        Ok(new_off)
    }

    pub(crate) fn skip(msg: &[u8], off: usize) -> Result<usize> {
        // new_off is the offset where parsing should resume.
        let mut new_off = off;

        loop {
            if new_off >= msg.len() {
                return Err(Error::ErrBaseLen);
            }
            let c = msg[new_off] as usize;
            new_off += 1;
            match c & 0xC0 {
                0x00 => {
                    if c == 0x00 {
                        // A zero length signals the end of the name.
                        return Ok(new_off);
                    }
                    // literal string
                    new_off += c;
                    if new_off > msg.len() {
                        return Err(Error::ErrCalcLen);
                    }
                }
                0xC0 => {
                    // Pointer to somewhere else in msg. Pointers are only
                    // allowed at the end of a name, so this is the end.
                    new_off += 1;
                    if new_off > msg.len() {
                        return Err(Error::ErrInvalidPtr);
                    }
                    return Ok(new_off);
                }
                // Prefixes 0x80 and 0x40 are reserved.
                _ => return Err(Error::ErrReserved),
            }
        }
    }
}
