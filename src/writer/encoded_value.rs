//! Serialization of encoded_value, encoded_array and encoded_annotation.
//! Shared by static-values arrays, call-site arrays and annotations.

use super::buffer::OutputBuffer;
use crate::program::{EncodedAnnotation, EncodedValue};
use crate::Result;

#[rustfmt::skip]
mod value_type {
    pub const BYTE: u8          = 0x00;
    pub const SHORT: u8         = 0x02;
    pub const CHAR: u8          = 0x03;
    pub const INT: u8           = 0x04;
    pub const LONG: u8          = 0x06;
    pub const FLOAT: u8         = 0x10;
    pub const DOUBLE: u8        = 0x11;
    pub const METHOD_TYPE: u8   = 0x15;
    pub const METHOD_HANDLE: u8 = 0x16;
    pub const STRING: u8        = 0x17;
    pub const TYPE: u8          = 0x18;
    pub const FIELD: u8         = 0x19;
    pub const METHOD: u8        = 0x1a;
    pub const ENUM: u8          = 0x1b;
    pub const ARRAY: u8         = 0x1c;
    pub const ANNOTATION: u8    = 0x1d;
    pub const NULL: u8          = 0x1e;
    pub const BOOLEAN: u8       = 0x1f;
}

pub fn write_value(out: &mut OutputBuffer<'_>, value: &EncodedValue) -> Result<()> {
    use EncodedValue::*;
    match value {
        Byte(v) => write_signed(out, value_type::BYTE, *v as i64),
        Short(v) => write_signed(out, value_type::SHORT, *v as i64),
        Char(v) => write_unsigned(out, value_type::CHAR, *v as u64),
        Int(v) => write_signed(out, value_type::INT, *v as i64),
        Long(v) => write_signed(out, value_type::LONG, *v),
        Float(v) => write_right_extended(out, value_type::FLOAT, v.to_bits() as u64, 4),
        Double(v) => write_right_extended(out, value_type::DOUBLE, v.to_bits(), 8),
        MethodType(v) => write_unsigned(out, value_type::METHOD_TYPE, *v as u64),
        MethodHandle(v) => write_unsigned(out, value_type::METHOD_HANDLE, *v as u64),
        String(v) => write_unsigned(out, value_type::STRING, *v as u64),
        Type(v) => write_unsigned(out, value_type::TYPE, *v as u64),
        Field(v) => write_unsigned(out, value_type::FIELD, *v as u64),
        Method(v) => write_unsigned(out, value_type::METHOD, *v as u64),
        Enum(v) => write_unsigned(out, value_type::ENUM, *v as u64),
        Array(values) => {
            out.write_u8(value_type::ARRAY)?;
            write_array(out, values)
        }
        Annotation(annotation) => {
            out.write_u8(value_type::ANNOTATION)?;
            write_annotation(out, annotation)
        }
        Null => out.write_u8(value_type::NULL),
        Boolean(v) => out.write_u8(((*v as u8) << 5) | value_type::BOOLEAN),
    }
}

/// ULEB128 element count followed by the element values.
pub fn write_array(out: &mut OutputBuffer<'_>, values: &[EncodedValue]) -> Result<()> {
    out.write_uleb128(values.len() as u32)?;
    for value in values {
        write_value(out, value)?;
    }
    Ok(())
}

/// Type index, element count, then the elements in ascending element-name
/// string-index order.
pub fn write_annotation(out: &mut OutputBuffer<'_>, annotation: &EncodedAnnotation) -> Result<()> {
    out.write_uleb128(annotation.type_idx as u32)?;
    out.write_uleb128(annotation.elements.len() as u32)?;
    let mut elements: Vec<_> = annotation.elements.iter().collect();
    elements.sort_by_key(|element| element.name_idx);
    for element in elements {
        out.write_uleb128(element.name_idx)?;
        write_value(out, &element.value)?;
    }
    Ok(())
}

/// Sign-extended value in the smallest number of little-endian bytes.
fn write_signed(out: &mut OutputBuffer<'_>, value_type: u8, value: i64) -> Result<()> {
    let mut size = 1;
    while size < 8 {
        let shift = 64 - 8 * size;
        if (value << shift) >> shift == value {
            break;
        }
        size += 1;
    }
    out.write_u8((((size - 1) as u8) << 5) | value_type)?;
    out.write_bytes(&value.to_le_bytes()[..size])
}

/// Zero-extended value in the smallest number of little-endian bytes.
fn write_unsigned(out: &mut OutputBuffer<'_>, value_type: u8, value: u64) -> Result<()> {
    let mut size = 1;
    while size < 8 && (value >> (8 * size)) != 0 {
        size += 1;
    }
    out.write_u8((((size - 1) as u8) << 5) | value_type)?;
    out.write_bytes(&value.to_le_bytes()[..size])
}

/// IEEE754 bit patterns drop their low-order zero bytes; the reader
/// extends to the right.
fn write_right_extended(
    out: &mut OutputBuffer<'_>,
    value_type: u8,
    bits: u64,
    width: usize,
) -> Result<()> {
    let mut bits = bits;
    let mut size = width;
    while size > 1 && bits & 0xff == 0 {
        bits >>= 8;
        size -= 1;
    }
    out.write_u8((((size - 1) as u8) << 5) | value_type)?;
    out.write_bytes(&bits.to_le_bytes()[..size])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::AnnotationElement;
    use crate::writer::buffer::HeapBufferProvider;

    fn encode(value: &EncodedValue) -> Vec<u8> {
        let provider = HeapBufferProvider::new();
        let mut out = OutputBuffer::new(&provider, 32);
        write_value(&mut out, value).unwrap();
        out.steal_buffer()
    }

    #[test]
    fn test_signed_trimming() {
        assert_eq!(encode(&EncodedValue::Int(0)), &[0x04, 0x00]);
        assert_eq!(encode(&EncodedValue::Int(-1)), &[0x04, 0xff]);
        assert_eq!(encode(&EncodedValue::Int(127)), &[0x04, 0x7f]);
        assert_eq!(encode(&EncodedValue::Int(128)), &[0x24, 0x80, 0x00]);
        assert_eq!(encode(&EncodedValue::Int(-129)), &[0x24, 0x7f, 0xff]);
        assert_eq!(
            encode(&EncodedValue::Long(i64::MIN)),
            &[0xe6, 0, 0, 0, 0, 0, 0, 0, 0x80]
        );
        assert_eq!(encode(&EncodedValue::Byte(-2)), &[0x00, 0xfe]);
        assert_eq!(encode(&EncodedValue::Short(256)), &[0x22, 0x00, 0x01]);
    }

    #[test]
    fn test_unsigned_trimming() {
        assert_eq!(encode(&EncodedValue::Char(0)), &[0x03, 0x00]);
        assert_eq!(encode(&EncodedValue::Char(0xffff)), &[0x23, 0xff, 0xff]);
        assert_eq!(encode(&EncodedValue::String(0)), &[0x17, 0x00]);
        assert_eq!(encode(&EncodedValue::String(0x100)), &[0x37, 0x00, 0x01]);
        assert_eq!(encode(&EncodedValue::Type(2)), &[0x18, 0x02]);
    }

    #[test]
    fn test_floats_right_extended() {
        // 1.0f is 0x3f800000: the two low-order zero bytes are dropped.
        assert_eq!(encode(&EncodedValue::Float(1.0)), &[0x30, 0x80, 0x3f]);
        assert_eq!(encode(&EncodedValue::Float(0.0)), &[0x10, 0x00]);
        // 2.0 is 0x4000000000000000.
        assert_eq!(encode(&EncodedValue::Double(2.0)), &[0x11, 0x40]);
    }

    #[test]
    fn test_special_forms() {
        assert_eq!(encode(&EncodedValue::Null), &[0x1e]);
        assert_eq!(encode(&EncodedValue::Boolean(false)), &[0x1f]);
        assert_eq!(encode(&EncodedValue::Boolean(true)), &[0x3f]);
    }

    #[test]
    fn test_array() {
        let value = EncodedValue::Array(vec![EncodedValue::Int(1), EncodedValue::Null]);
        assert_eq!(encode(&value), &[0x1c, 0x02, 0x04, 0x01, 0x1e]);
    }

    #[test]
    fn test_annotation_elements_sorted_by_name() {
        let annotation = EncodedAnnotation {
            type_idx: 3,
            elements: vec![
                AnnotationElement {
                    name_idx: 9,
                    value: EncodedValue::Boolean(true),
                },
                AnnotationElement {
                    name_idx: 4,
                    value: EncodedValue::Null,
                },
            ],
        };
        let value = EncodedValue::Annotation(annotation);
        assert_eq!(encode(&value), &[0x1d, 0x03, 0x02, 0x04, 0x1e, 0x09, 0x3f]);
    }
}
