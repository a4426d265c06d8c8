//! `ReadFields` and `WriteFields` say that a type can be read from/written to
//! as a run of fixed-width little-endian integers, which is all that the
//! archive descriptors and image headers in this crate are.
//!
//! The traits `ReadFields` and `WriteFields` are implemented
//! for any type that implements `Read` and `Write` (respectively),
//! so they **do not need to be implemented by the user**

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_traits::PrimInt;
use std::io;

/// An integer type that is stored as a single little-endian field.
pub trait LeField: PrimInt {
    fn read_le<R: ReadBytesExt + ?Sized>(src: &mut R) -> io::Result<Self>;
    fn write_le<W: WriteBytesExt + ?Sized>(self, dst: &mut W) -> io::Result<()>;
}

macro_rules! make_impl {
    { $inttype:ty, $readfn:ident, $writefn:ident } => {
        impl LeField for $inttype {
            fn read_le<R: ReadBytesExt + ?Sized>(src: &mut R) -> io::Result<$inttype> {
                src.$readfn::<LittleEndian>()
            }
            fn write_le<W: WriteBytesExt + ?Sized>(self, dst: &mut W) -> io::Result<()> {
                dst.$writefn::<LittleEndian>(self)
            }
        }
    };
}

// Special cased because a single byte has no ordering
impl LeField for u8 {
    fn read_le<R: ReadBytesExt + ?Sized>(src: &mut R) -> io::Result<u8> {
        src.read_u8()
    }
    fn write_le<W: WriteBytesExt + ?Sized>(self, dst: &mut W) -> io::Result<()> {
        dst.write_u8(self)
    }
}

make_impl! { u16, read_u16, write_u16 }
make_impl! { u32, read_u32, write_u32 }

pub trait ReadFields: ReadBytesExt {
    /// Reads `N` consecutive fields of type `T`
    fn read_fields<T: LeField, const N: usize>(&mut self) -> io::Result<[T; N]> {
        let mut fields = [T::zero(); N];
        for field in fields.iter_mut() {
            *field = T::read_le(self)?;
        }
        Ok(fields)
    }

    /// Reads an `N`-byte magic/signature as-is
    fn read_magic<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut magic = [0; N];
        self.read_exact(&mut magic)?;
        Ok(magic)
    }
}

pub trait WriteFields: WriteBytesExt {
    fn write_fields<T: LeField>(&mut self, fields: &[T]) -> io::Result<()> {
        for &field in fields {
            field.write_le(self)?;
        }
        Ok(())
    }
}

impl<R: ReadBytesExt + ?Sized> ReadFields for R {}
impl<W: WriteBytesExt + ?Sized> WriteFields for W {}
