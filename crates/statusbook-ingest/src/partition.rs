//! Batch partitioning
//!
//! [`partition`] slices an in-memory sequence into fixed-size batches.
//! [`RowChunks`] does the same one level up for the parallel file path: it
//! reads a CSV file lazily and yields fixed-size chunks of raw rows, so a
//! large file is never held in memory at once.

use csv::{Reader, StringRecord};
use statusbook_common::Result;
use std::fs::File;
use std::io::Read;
use std::num::NonZeroUsize;
use std::path::Path;

/// Split `items` into contiguous batches of `batch_size`, the last possibly shorter
pub fn partition<T>(items: Vec<T>, batch_size: NonZeroUsize) -> Vec<Vec<T>> {
    let size = batch_size.get();
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut items = items.into_iter();

    loop {
        let batch: Vec<T> = items.by_ref().take(size).collect();
        if batch.is_empty() {
            break;
        }
        batches.push(batch);
    }

    batches
}

/// Batch size giving each of `workers` one batch of a `len`-row chunk
pub fn worker_batch_size(len: usize, workers: NonZeroUsize) -> NonZeroUsize {
    NonZeroUsize::new(len / workers.get() + 1).unwrap_or(NonZeroUsize::MIN)
}

/// A contiguous run of raw CSV rows plus the header they belong to
#[derive(Debug, Clone)]
pub struct RowChunk {
    /// Zero-based position of the chunk in the file
    pub index: usize,
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
}

impl RowChunk {
    /// Re-encode the chunk as a standalone CSV document with a header row
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()).into())
    }
}

/// Lazily reads a CSV source in chunks of `chunk_rows` rows
pub struct RowChunks<R: Read> {
    reader: Reader<R>,
    headers: StringRecord,
    chunk_rows: usize,
    next_index: usize,
    finished: bool,
}

impl RowChunks<File> {
    /// Open `path` and read its header row
    ///
    /// Fails before any data row is read if the file is missing or has no header.
    pub fn open(path: &Path, chunk_rows: NonZeroUsize) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file, chunk_rows)
    }
}

impl<R: Read> RowChunks<R> {
    pub fn from_reader(source: R, chunk_rows: NonZeroUsize) -> Result<Self> {
        let mut reader = csv_reader(source);
        let headers = reader.headers()?.clone();

        Ok(Self {
            reader,
            headers,
            chunk_rows: chunk_rows.get(),
            next_index: 0,
            finished: false,
        })
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }
}

impl<R: Read> Iterator for RowChunks<R> {
    type Item = Result<RowChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut rows = Vec::with_capacity(self.chunk_rows);
        let mut record = StringRecord::new();

        while rows.len() < self.chunk_rows {
            match self.reader.read_record(&mut record) {
                Ok(true) => rows.push(record.clone()),
                Ok(false) => {
                    self.finished = true;
                    break;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
            }
        }

        if rows.is_empty() {
            return None;
        }

        let chunk = RowChunk {
            index: self.next_index,
            headers: self.headers.clone(),
            rows,
        };
        self.next_index += 1;
        Some(Ok(chunk))
    }
}

/// CSV reader settings shared by every input path
pub(crate) fn csv_reader<R: Read>(source: R) -> Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(source)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_partition_shapes() {
        let batches = partition((0..7).collect(), nz(3));
        assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);

        assert!(partition(Vec::<u8>::new(), nz(5)).is_empty());
        assert_eq!(partition(vec![1, 2], nz(10)), vec![vec![1, 2]]);
    }

    #[test]
    fn test_worker_batch_size() {
        assert_eq!(worker_batch_size(1000, nz(4)).get(), 251);
        assert_eq!(worker_batch_size(0, nz(4)).get(), 1);
        assert_eq!(worker_batch_size(3, nz(8)).get(), 1);
    }

    proptest! {
        #[test]
        fn prop_partition_preserves_order_and_bounds(
            items in proptest::collection::vec(any::<u32>(), 0..300),
            size in 1usize..40,
        ) {
            let batches = partition(items.clone(), nz(size));

            prop_assert_eq!(batches.len(), items.len().div_ceil(size));
            if let Some((last, full)) = batches.split_last() {
                prop_assert!(full.iter().all(|b| b.len() == size));
                prop_assert!(!last.is_empty() && last.len() <= size);
            }

            let flattened: Vec<u32> = batches.into_iter().flatten().collect();
            prop_assert_eq!(flattened, items);
        }
    }

    #[test]
    fn test_row_chunks_split_lazily() {
        let data = "USER_ID,EMAIL\na,1\nb,2\nc,3\nd,4\ne,5\n";
        let chunks: Vec<RowChunk> = RowChunks::from_reader(data.as_bytes(), nz(2))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(chunks[2].rows.len(), 1);
        assert_eq!(&chunks[0].headers[0], "USER_ID");
        assert_eq!(&chunks[1].rows[0][0], "c");
    }

    #[test]
    fn test_chunk_round_trips_as_csv() {
        let data = "STATUS_ID,USER_ID,STATUS_TEXT\ns1,u1,\"hello, world\"\n";
        let chunk = RowChunks::from_reader(data.as_bytes(), nz(10))
            .unwrap()
            .next()
            .unwrap()
            .unwrap();

        let encoded = String::from_utf8(chunk.to_csv().unwrap()).unwrap();
        assert_eq!(encoded, data);
    }

    #[test]
    fn test_header_only_file_has_no_chunks() {
        let mut chunks = RowChunks::from_reader("USER_ID\n".as_bytes(), nz(2)).unwrap();
        assert_eq!(chunks.headers().len(), 1);
        assert!(chunks.next().is_none());
    }

    #[test]
    fn test_missing_file_fails_on_open() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RowChunks::open(&dir.path().join("absent.csv"), nz(2)).is_err());
    }
}
