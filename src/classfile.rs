//! Static class-file metadata extraction.
//!
//! Reads the declared facts of a compiled class (binary name, package,
//! interface flag) straight from the class-file header and constant pool,
//! so no type ever has to be loadable in the host process.

use anyhow::{Result, bail};

const MAGIC: u32 = 0xCAFE_BABE;
const ACC_INTERFACE: u16 = 0x0200;

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

/// Declared facts of one class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMetadata {
    /// Dotted fully qualified name, e.g. `com.acme.Widget`. Never empty.
    pub name: String,
    /// Dotted package name, empty for the default package.
    pub package: String,
    pub is_interface: bool,
}

impl ClassMetadata {
    /// Parses the leading structure of a class file: magic, versions,
    /// constant pool, access flags and `this_class`. Anything after
    /// `this_class` is irrelevant here and is not touched.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);

        let magic = r.read_u32()?;
        if magic != MAGIC {
            bail!("not a class file (bad magic: {magic:#010x})");
        }
        let _minor = r.read_u16()?;
        let _major = r.read_u16()?;

        let pool = ConstantPool::parse(&mut r)?;

        let access_flags = r.read_u16()?;
        let this_class = r.read_u16()?;

        let binary_name = pool.class_name(this_class)?;
        if binary_name.is_empty() {
            bail!("class file declares an empty name");
        }
        let name = binary_name.replace('/', ".");
        let package = match name.rsplit_once('.') {
            Some((pkg, _)) => pkg.to_string(),
            None => String::new(),
        };

        Ok(Self {
            name,
            package,
            is_interface: access_flags & ACC_INTERFACE != 0,
        })
    }
}

/// The subset of the constant pool needed for name resolution: Utf8 entries
/// and Class name indices. Everything else is parsed for its size only.
struct ConstantPool {
    entries: Vec<Constant>,
}

enum Constant {
    Utf8(String),
    Class { name_index: u16 },
    Other,
}

impl ConstantPool {
    fn parse(r: &mut Reader<'_>) -> Result<Self> {
        let count = r.read_u16()?;
        let mut entries = Vec::with_capacity(count as usize);
        // Index 0 is unused by the format.
        entries.push(Constant::Other);

        let mut index = 1u16;
        while index < count {
            let tag = r.read_u8()?;
            let constant = match tag {
                TAG_UTF8 => {
                    let len = r.read_u16()? as usize;
                    let raw = r.read_bytes(len)?;
                    Constant::Utf8(String::from_utf8_lossy(raw).into_owned())
                }
                TAG_CLASS => Constant::Class {
                    name_index: r.read_u16()?,
                },
                TAG_STRING | TAG_METHOD_TYPE | TAG_MODULE | TAG_PACKAGE => {
                    r.skip(2)?;
                    Constant::Other
                }
                TAG_INTEGER | TAG_FLOAT => {
                    r.skip(4)?;
                    Constant::Other
                }
                TAG_FIELDREF | TAG_METHODREF | TAG_INTERFACE_METHODREF | TAG_NAME_AND_TYPE
                | TAG_DYNAMIC | TAG_INVOKE_DYNAMIC => {
                    r.skip(4)?;
                    Constant::Other
                }
                TAG_METHOD_HANDLE => {
                    r.skip(3)?;
                    Constant::Other
                }
                TAG_LONG | TAG_DOUBLE => {
                    r.skip(8)?;
                    Constant::Other
                }
                other => bail!("unknown constant pool tag {other} at entry {index}"),
            };

            // Long and Double occupy two pool slots.
            let wide = tag == TAG_LONG || tag == TAG_DOUBLE;
            entries.push(constant);
            if wide {
                entries.push(Constant::Other);
                index += 2;
            } else {
                index += 1;
            }
        }

        Ok(Self { entries })
    }

    fn class_name(&self, class_index: u16) -> Result<&str> {
        let Some(Constant::Class { name_index }) = self.entries.get(class_index as usize) else {
            bail!("this_class index {class_index} is not a Class constant");
        };
        let Some(Constant::Utf8(name)) = self.entries.get(*name_index as usize) else {
            bail!("class name index {name_index} is not a Utf8 constant");
        };
        Ok(name)
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&e| e <= self.buf.len());
        let Some(end) = end else {
            bail!("class file truncated at offset {}", self.pos);
        };
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len)?;
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
pub(crate) mod testdata {
    /// Builds a minimal valid class file declaring `binary_name`
    /// (slash-separated), with `trailing_newlines` newline bytes appended
    /// after the structured prefix.
    pub(crate) fn minimal_class(binary_name: &str, interface: bool, trailing_newlines: usize) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // minor
        out.extend_from_slice(&52u16.to_be_bytes()); // major (Java 8)

        // Pool: 1 = Utf8 name, 2 = Class(1), 3 = Utf8 super, 4 = Class(3).
        out.extend_from_slice(&5u16.to_be_bytes());
        push_utf8(&mut out, binary_name);
        push_class(&mut out, 1);
        push_utf8(&mut out, "java/lang/Object");
        push_class(&mut out, 3);

        let access: u16 = if interface { 0x0601 } else { 0x0021 };
        out.extend_from_slice(&access.to_be_bytes());
        out.extend_from_slice(&2u16.to_be_bytes()); // this_class
        out.extend_from_slice(&4u16.to_be_bytes()); // super_class
        out.extend_from_slice(&0u16.to_be_bytes()); // interfaces_count
        out.extend_from_slice(&0u16.to_be_bytes()); // fields_count
        out.extend_from_slice(&0u16.to_be_bytes()); // methods_count
        out.extend_from_slice(&0u16.to_be_bytes()); // attributes_count

        out.extend(std::iter::repeat(b'\n').take(trailing_newlines));
        out
    }

    fn push_utf8(out: &mut Vec<u8>, s: &str) {
        out.push(1);
        out.extend_from_slice(&(s.len() as u16).to_be_bytes());
        out.extend_from_slice(s.as_bytes());
    }

    fn push_class(out: &mut Vec<u8>, name_index: u16) {
        out.push(7);
        out.extend_from_slice(&name_index.to_be_bytes());
    }
}
