//! Byte-offset account codec.
//!
//! Pool accounts are dense little-endian blobs; decoding walks a cursor and
//! reports the failing field and offset. Unknown trailing bytes are ignored.

use solana_sdk::pubkey::Pubkey;

use crate::errors::DecodeError;

pub struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    fn take(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.offset.checked_add(len).ok_or(DecodeError::Field {
            field,
            offset: self.offset,
        })?;
        let slice = self.data.get(self.offset..end).ok_or(DecodeError::Field {
            field,
            offset: self.offset,
        })?;
        self.offset = end;
        Ok(slice)
    }

    pub fn skip(&mut self, field: &'static str, len: usize) -> Result<(), DecodeError> {
        self.take(field, len).map(|_| ())
    }

    pub fn u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        Ok(self.take(field, 1)?[0])
    }

    pub fn u16(&mut self, field: &'static str) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.take(field, 2)?.try_into().unwrap()))
    }

    pub fn u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take(field, 4)?.try_into().unwrap()))
    }

    pub fn i32(&mut self, field: &'static str) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.take(field, 4)?.try_into().unwrap()))
    }

    pub fn u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.take(field, 8)?.try_into().unwrap()))
    }

    pub fn i64(&mut self, field: &'static str) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.take(field, 8)?.try_into().unwrap()))
    }

    pub fn u128(&mut self, field: &'static str) -> Result<u128, DecodeError> {
        Ok(u128::from_le_bytes(self.take(field, 16)?.try_into().unwrap()))
    }

    pub fn pubkey(&mut self, field: &'static str) -> Result<Pubkey, DecodeError> {
        let bytes: [u8; 32] = self.take(field, 32)?.try_into().unwrap();
        Ok(Pubkey::new_from_array(bytes))
    }

    pub fn u64_array<const N: usize>(
        &mut self,
        field: &'static str,
    ) -> Result<[u64; N], DecodeError> {
        let mut out = [0u64; N];
        for slot in out.iter_mut() {
            *slot = self.u64(field)?;
        }
        Ok(out)
    }
}

