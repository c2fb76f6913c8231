//! Bounds-checked record views

use std::fmt;
use std::marker::PhantomData;

use crate::binaries::{IndexRange, Record};
use crate::error::RangeError;

/// Random-access view over one record array of a loaded database
///
/// Records are read by value from their packed byte image.
pub struct Table<'a, T: Record> {
    data: &'a [u8],
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Record> Clone for Table<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Record> Copy for Table<'_, T> {}

impl<T: Record> fmt::Debug for Table<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("table", &T::TABLE)
            .field("len", &self.len)
            .finish()
    }
}

impl<'a, T: Record> Table<'a, T> {
    /// View over `data`, which must hold a whole number of records
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Table {
            data,
            len: data.len() / T::SIZE,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Record at `index`
    pub fn get(&self, index: usize) -> Result<T, RangeError> {
        if index >= self.len {
            return Err(self.range_error(index as u64));
        }
        let offset = index * T::SIZE;
        T::read_from_bytes(&self.data[offset..offset + T::SIZE])
            .map_err(|_| self.range_error(index as u64))
    }

    /// The records covered by a parent's child range
    pub fn subview(&self, range: IndexRange) -> Result<Table<'a, T>, RangeError> {
        let start = range.start as usize;
        let end = start + range.count as usize;
        if end > self.len {
            return Err(self.range_error(end as u64));
        }
        Ok(Table::new(&self.data[start * T::SIZE..end * T::SIZE]))
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + 'a {
        self.data
            .chunks_exact(T::SIZE)
            .filter_map(|chunk| T::read_from_bytes(chunk).ok())
    }

    fn range_error(&self, index: u64) -> RangeError {
        RangeError {
            table: T::TABLE,
            index,
            len: self.len as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binaries::Sample;
    use zerocopy::IntoBytes;

    fn samples() -> Vec<Sample> {
        (10..15).map(|name| Sample { name }).collect()
    }

    #[test]
    fn test_get_and_bounds() {
        let records = samples();
        let table = Table::<Sample>::new(records.as_bytes());
        assert_eq!(table.len(), 5);
        assert_eq!({ table.get(0).unwrap().name }, 10);
        assert_eq!({ table.get(4).unwrap().name }, 14);

        let err = table.get(5).unwrap_err();
        assert_eq!(err.to_string(), "index 5 out of range for samples (length 5)");
    }

    #[test]
    fn test_subview() {
        let records = samples();
        let table = Table::<Sample>::new(records.as_bytes());

        let sub = table.subview(IndexRange { start: 1, count: 3 }).unwrap();
        let names: Vec<u32> = sub.iter().map(|s| s.name).collect();
        assert_eq!(names, vec![11, 12, 13]);
        assert!(sub.get(3).is_err());

        assert!(table.subview(IndexRange { start: 4, count: 2 }).is_err());
        assert!(table.subview(IndexRange::empty_at(5)).unwrap().is_empty());
    }
}
