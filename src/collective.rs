//! Collective communication
//!
//! Collectives are operations every member of a communicator's group must
//! call; completion requires participation from all of them. The engine here
//! is stateless, pure assembly over the communicator's primitives, and the
//! result layout is globally agreed: output index *i* always holds rank *i*'s
//! contribution, regardless of arrival or completion order.
//!
//! The variable-length gather is built from the fixed-size one: a preliminary
//! [`all_gather`](Communicator::all_gather) of per-rank element counts feeds
//! the displacement computation for the single variable-length exchange that
//! follows.

use conv::ConvUtil;
use log::trace;
use smallvec::SmallVec;

use crate::datatype::{self, FixedSizeValue};
use crate::error::{Error, Result};
use crate::topology::Communicator;
use crate::Count;

/// Byte displacements of each rank's chunk within a flat buffer: the
/// exclusive prefix sum of the per-rank element counts, scaled by the element
/// size.
fn displacements(counts: &[Count], elem_size: usize) -> SmallVec<[usize; 8]> {
    let mut displs = SmallVec::with_capacity(counts.len());
    let mut offset = 0usize;
    for &count in counts {
        displs.push(offset);
        let count: usize = count
            .value_as()
            .expect("negative element count in variable-length gather");
        offset += count * elem_size;
    }
    displs
}

/// Collective operations.
impl Communicator {
    /// Blocks until every member of the group has entered the barrier.
    pub fn barrier(&self) -> Result<()> {
        let h = self.handle()?;
        h.transport.barrier(h.channel)?;
        Ok(())
    }

    /// Exchanges equal shards of `send` with every rank.
    ///
    /// The buffer is partitioned into `size` equal shards; shard *i* is sent
    /// to rank *i*, and shard *i* of the result originates from rank *i*.
    /// Fails with [`Error::UnevenAllToAll`] unless the buffer length is
    /// evenly divisible by the group size.
    pub fn all_to_all(&self, send: &[u8]) -> Result<Vec<u8>> {
        let h = self.handle()?;
        let size = self.size();
        let size_usize: usize = size.value_as().expect("group size exceeds usize");
        if size_usize == 0 || send.len() % size_usize != 0 {
            return Err(Error::UnevenAllToAll {
                len: send.len(),
                size,
            });
        }
        trace!("all_to_all of {} bytes across {} ranks", send.len(), size);
        Ok(h.transport.all_to_all(h.channel, send)?)
    }

    /// Gathers one fixed-size value from every member.
    ///
    /// The result holds rank *i*'s contribution at index *i* and is
    /// byte-for-byte identical on every member.
    pub fn all_gather<T: FixedSizeValue>(&self, value: &T) -> Result<Vec<T>> {
        let h = self.handle()?;
        let size: usize = self.size().value_as().expect("group size exceeds usize");
        let raw = h.transport.all_gather(h.channel, &datatype::encode(value))?;
        if raw.len() != size * T::SIZE {
            return Err(Error::SizeMismatch {
                expected: size * T::SIZE,
                actual: raw.len(),
            });
        }
        raw.chunks_exact(T::SIZE).map(datatype::decode).collect()
    }

    /// Gathers a variable-length sequence from every member.
    ///
    /// Each member may contribute a sequence of a different length, including
    /// zero. The result holds rank *i*'s sequence at index *i* on every
    /// member; an empty contribution yields an empty sequence.
    ///
    /// Internally this gathers the per-rank element counts first, computes
    /// byte displacements as their prefix sum, issues one variable-length
    /// gather with that layout, and splits the flat result back by rank.
    pub fn all_gather_varcount<T: FixedSizeValue>(&self, items: &[T]) -> Result<Vec<Vec<T>>> {
        let h = self.handle()?;
        let my_count: Count = items
            .len()
            .value_as()
            .expect("sequence length exceeds the range of Count");

        let counts = self.all_gather(&my_count)?;
        let my_rank: usize = self.rank().value_as().expect("rank is not an index");
        if counts[my_rank] != my_count {
            return Err(Error::VarcountMismatch {
                announced: counts[my_rank],
                actual: items.len(),
            });
        }
        trace!("all_gather_varcount with per-rank counts {:?}", counts);

        let displs = displacements(&counts, T::SIZE);
        let byte_counts: SmallVec<[usize; 8]> = counts
            .iter()
            .map(|&c| {
                let c: usize = c.value_as().expect("negative element count");
                c * T::SIZE
            })
            .collect();

        let mut send = Vec::with_capacity(items.len() * T::SIZE);
        for item in items {
            send.extend_from_slice(&datatype::encode(item));
        }

        let flat = h
            .transport
            .all_gather_varcount(h.channel, &send, &byte_counts, &displs)?;

        let mut result = Vec::with_capacity(counts.len());
        for (&displ, &byte_count) in displs.iter().zip(&byte_counts) {
            let chunk = flat.get(displ..displ + byte_count).ok_or({
                Error::SizeMismatch {
                    expected: displ + byte_count,
                    actual: flat.len(),
                }
            })?;
            let sequence: Vec<T> = chunk
                .chunks_exact(T::SIZE)
                .map(datatype::decode)
                .collect::<Result<_>>()?;
            result.push(sequence);
        }
        Ok(result)
    }
}
