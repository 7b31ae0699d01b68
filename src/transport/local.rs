//! In-process reference transport
//!
//! Each rank of the group is a thread holding its own [`LocalTransport`]
//! endpoint over shared state: one mailbox per rank per channel, guarded by a
//! mutex and a condition variable. Sends are buffered (the payload is copied
//! into the destination mailbox and the call returns), which means
//! non-blocking operations complete at creation, mirroring an eager-mode
//! transport.
//!
//! Delivery is FIFO per `(source, destination, tag)` triple: probes and
//! receives scan the mailbox in arrival order.
//!
//! Channel duplication is not synchronized but must follow collective
//! discipline: every rank duplicates a given channel in the same order, and
//! the *n*-th duplication of a channel resolves to the same new channel on
//! every rank.
//!
//! As a convenience over a real wire transport, blocking calls fail with
//! [`TransportError::Disconnected`] instead of suspending forever when every
//! endpoint that could satisfy them has been dropped. This keeps a test from
//! hanging when a peer thread dies.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use log::trace;

use crate::environment::{initialize, Universe};
use crate::topology::Rank;
use crate::{Count, Tag, ANY_SOURCE, ANY_TAG};

use super::{ChannelId, Envelope, MessageId, OpId, Result, Transport, TransportError};

const WORLD: ChannelId = ChannelId(0);

struct Message {
    id: MessageId,
    source: Rank,
    tag: Tag,
    payload: Vec<u8>,
}

fn matches(message: &Message, source: Rank, tag: Tag) -> bool {
    (source == ANY_SOURCE || message.source == source)
        && (tag == ANY_TAG || message.tag == tag)
}

enum Op {
    Send,
    Recv { payload: Vec<u8> },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum CollectiveKind {
    Barrier,
    AllToAll,
    AllGather,
    AllGatherVar,
}

#[derive(Clone)]
enum CollectiveFailure {
    Mismatch(String),
    Disconnected(Rank),
}

impl CollectiveFailure {
    fn into_error(self) -> TransportError {
        match self {
            CollectiveFailure::Mismatch(msg) => TransportError::CollectiveMismatch(msg),
            CollectiveFailure::Disconnected(rank) => TransportError::Disconnected(rank),
        }
    }
}

struct CollectiveSlot {
    kind: CollectiveKind,
    counts: Vec<usize>,
    displs: Vec<usize>,
    contrib: Vec<Option<Vec<u8>>>,
    outputs: Option<Vec<Option<Vec<u8>>>>,
    failure: Option<CollectiveFailure>,
    taken: usize,
}

impl CollectiveSlot {
    fn new(kind: CollectiveKind, size: usize, counts: Vec<usize>, displs: Vec<usize>) -> Self {
        CollectiveSlot {
            kind,
            counts,
            displs,
            contrib: (0..size).map(|_| None).collect(),
            outputs: None,
            failure: None,
            taken: 0,
        }
    }

    /// Builds every rank's output once all contributions are in.
    fn assemble(&mut self) -> std::result::Result<(), String> {
        let contribs: Vec<&Vec<u8>> = self
            .contrib
            .iter()
            .map(|c| c.as_ref().expect("assemble called before all contributions"))
            .collect();
        let size = contribs.len();
        let outputs: Vec<Vec<u8>> = match self.kind {
            CollectiveKind::Barrier => vec![Vec::new(); size],
            CollectiveKind::AllGather => {
                let each = contribs[0].len();
                if contribs.iter().any(|c| c.len() != each) {
                    return Err("all_gather contributions differ in size".to_string());
                }
                let mut flat = Vec::with_capacity(each * size);
                for c in &contribs {
                    flat.extend_from_slice(c);
                }
                vec![flat; size]
            }
            CollectiveKind::AllToAll => {
                let each = contribs[0].len();
                if contribs.iter().any(|c| c.len() != each) {
                    return Err("all_to_all buffers differ in size".to_string());
                }
                if each % size != 0 {
                    return Err("all_to_all buffer not divisible by group size".to_string());
                }
                let shard = each / size;
                (0..size)
                    .map(|i| {
                        let mut out = Vec::with_capacity(each);
                        for c in &contribs {
                            out.extend_from_slice(&c[i * shard..(i + 1) * shard]);
                        }
                        out
                    })
                    .collect()
            }
            CollectiveKind::AllGatherVar => {
                if self.counts.len() != size || self.displs.len() != size {
                    return Err(
                        "count/displacement vectors must have one entry per rank".to_string()
                    );
                }
                for (rank, c) in contribs.iter().enumerate() {
                    if c.len() != self.counts[rank] {
                        return Err(format!(
                            "rank {} contributed {} bytes but announced {}",
                            rank,
                            c.len(),
                            self.counts[rank]
                        ));
                    }
                }
                let total = self
                    .displs
                    .iter()
                    .zip(&self.counts)
                    .map(|(d, c)| d + c)
                    .max()
                    .unwrap_or(0);
                let mut flat = vec![0u8; total];
                for (rank, c) in contribs.iter().enumerate() {
                    flat[self.displs[rank]..self.displs[rank] + c.len()].copy_from_slice(c);
                }
                vec![flat; size]
            }
        };
        self.outputs = Some(outputs.into_iter().map(Some).collect());
        Ok(())
    }
}

struct Channel {
    /// Live endpoint references across all ranks.
    refs: usize,
    /// Which ranks have joined (duplicated into) this channel.
    joined: Vec<bool>,
    /// Back-pointer for registry cleanup on removal.
    parent: Option<(ChannelId, u64)>,
    /// Per-rank count of duplications issued *on* this channel.
    dup_seq: Vec<u64>,
    /// Duplication sequence number to child channel.
    dup_children: HashMap<u64, ChannelId>,
    /// Pending messages per destination rank, in arrival order.
    mailboxes: Vec<VecDeque<Message>>,
    /// Per-rank count of collective calls issued on this channel.
    coll_seq: Vec<u64>,
    /// In-flight collectives, keyed by call sequence number.
    collectives: HashMap<u64, CollectiveSlot>,
}

impl Channel {
    fn new(size: usize, parent: Option<(ChannelId, u64)>, creator: Option<usize>) -> Channel {
        let mut joined = vec![creator.is_none(); size];
        if let Some(rank) = creator {
            joined[rank] = true;
        }
        Channel {
            refs: if creator.is_none() { size } else { 1 },
            joined,
            parent,
            dup_seq: vec![0; size],
            dup_children: HashMap::new(),
            mailboxes: (0..size).map(|_| VecDeque::new()).collect(),
            coll_seq: vec![0; size],
            collectives: HashMap::new(),
        }
    }
}

struct State {
    next_channel: u64,
    next_message: u64,
    next_op: u64,
    alive: Vec<bool>,
    channels: HashMap<ChannelId, Channel>,
    ops: HashMap<OpId, Op>,
}

struct Shared {
    size: Count,
    state: Mutex<State>,
    cond: Condvar,
}

impl Shared {
    fn new(size: usize) -> Shared {
        let mut channels = HashMap::new();
        channels.insert(WORLD, Channel::new(size, None, None));
        Shared {
            size: size as Count,
            state: Mutex::new(State {
                next_channel: 1,
                next_message: 0,
                next_op: 0,
                alive: vec![true; size],
                channels,
                ops: HashMap::new(),
            }),
            cond: Condvar::new(),
        }
    }
}

/// One rank's endpoint of an in-process transport.
///
/// Endpoints are created together by [`LocalTransport::group`] and handed to
/// one thread each. Dropping an endpoint marks its rank as disconnected.
pub struct LocalTransport {
    rank: Rank,
    shared: Arc<Shared>,
}

impl LocalTransport {
    /// Creates the endpoints of a `size`-rank group, index *i* belonging to
    /// rank *i*.
    pub fn group(size: usize) -> Vec<LocalTransport> {
        assert!(size > 0, "a process group needs at least one rank");
        let shared = Arc::new(Shared::new(size));
        (0..size)
            .map(|rank| LocalTransport {
                rank: rank as Rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    /// The rank this endpoint belongs to.
    pub fn rank(&self) -> Rank {
        self.rank
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .expect("local transport state poisoned")
    }

    fn wait_on<'a>(&self, guard: MutexGuard<'a, State>) -> MutexGuard<'a, State> {
        self.shared
            .cond
            .wait(guard)
            .expect("local transport state poisoned")
    }

    fn check_dest(&self, dest: Rank) -> Result<()> {
        if dest < 0 || dest >= self.shared.size {
            return Err(TransportError::InvalidRank {
                rank: dest,
                size: self.shared.size,
            });
        }
        Ok(())
    }

    fn check_tag(&self, tag: Tag) -> Result<()> {
        if tag < 0 {
            return Err(TransportError::InvalidTag(tag));
        }
        Ok(())
    }

    fn check_source_filter(&self, source: Rank) -> Result<()> {
        if source == ANY_SOURCE {
            return Ok(());
        }
        self.check_dest(source)
    }

    fn check_tag_filter(&self, tag: Tag) -> Result<()> {
        if tag == ANY_TAG {
            return Ok(());
        }
        self.check_tag(tag)
    }

    /// A dead rank whose absence makes a blocking match impossible, if any.
    fn unreachable_source(&self, alive: &[bool], source: Rank) -> Option<Rank> {
        let me = self.rank as usize;
        if source == ANY_SOURCE {
            if alive.iter().enumerate().all(|(r, &a)| r == me || !a) {
                let peer = (0..alive.len()).find(|&r| r != me);
                Some(peer.map_or(ANY_SOURCE, |r| r as Rank))
            } else {
                None
            }
        } else if !alive[source as usize] {
            Some(source)
        } else {
            None
        }
    }

    fn deliver(&self, state: &mut State, channel: ChannelId, dest: Rank, tag: Tag, bytes: &[u8]) -> Result<()> {
        let id = MessageId(state.next_message);
        state.next_message += 1;
        let chan = state
            .channels
            .get_mut(&channel)
            .ok_or(TransportError::UnknownChannel(channel))?;
        chan.mailboxes[dest as usize].push_back(Message {
            id,
            source: self.rank,
            tag,
            payload: bytes.to_vec(),
        });
        trace!(
            "rank {} delivered {} bytes to rank {} (tag {}, {:?})",
            self.rank,
            bytes.len(),
            dest,
            tag,
            channel
        );
        self.shared.cond.notify_all();
        Ok(())
    }

    fn remove_message(&self, state: &mut State, channel: ChannelId, message: MessageId) -> Result<Vec<u8>> {
        let me = self.rank as usize;
        let chan = state
            .channels
            .get_mut(&channel)
            .ok_or(TransportError::UnknownChannel(channel))?;
        let index = chan.mailboxes[me]
            .iter()
            .position(|m| m.id == message)
            .ok_or(TransportError::UnknownMessage(message))?;
        let msg = chan.mailboxes[me].remove(index).expect("index just found");
        Ok(msg.payload)
    }

    /// Joins the per-channel collective rendezvous and blocks for the result.
    fn collective(
        &self,
        channel: ChannelId,
        kind: CollectiveKind,
        payload: Vec<u8>,
        counts: Vec<usize>,
        displs: Vec<usize>,
    ) -> Result<Vec<u8>> {
        let me = self.rank as usize;
        let size = self.shared.size as usize;
        let mut state = self.lock();

        let seq = {
            let chan = state
                .channels
                .get_mut(&channel)
                .ok_or(TransportError::UnknownChannel(channel))?;
            let seq = chan.coll_seq[me];
            chan.coll_seq[me] += 1;
            let slot = chan
                .collectives
                .entry(seq)
                .or_insert_with(|| CollectiveSlot::new(kind, size, counts.clone(), displs.clone()));
            if slot.failure.is_none() {
                if slot.kind != kind {
                    slot.failure = Some(CollectiveFailure::Mismatch(format!(
                        "rank {} called {:?} while peers called {:?}",
                        self.rank, kind, slot.kind
                    )));
                } else if slot.counts != counts || slot.displs != displs {
                    slot.failure = Some(CollectiveFailure::Mismatch(format!(
                        "rank {} passed a different count/displacement layout",
                        self.rank
                    )));
                }
            }
            slot.contrib[me] = Some(payload);
            if slot.failure.is_none() && slot.contrib.iter().all(Option::is_some) {
                if let Err(msg) = slot.assemble() {
                    slot.failure = Some(CollectiveFailure::Mismatch(msg));
                }
            }
            seq
        };
        self.shared.cond.notify_all();

        loop {
            let State {
                ref alive,
                ref mut channels,
                ..
            } = *state;
            let chan = channels
                .get_mut(&channel)
                .ok_or(TransportError::UnknownChannel(channel))?;
            let slot = chan
                .collectives
                .get_mut(&seq)
                .expect("collective slot removed while awaited");

            if slot.failure.is_none() && slot.outputs.is_none() {
                let dead = (0..size).find(|&r| slot.contrib[r].is_none() && !alive[r]);
                if let Some(rank) = dead {
                    slot.failure = Some(CollectiveFailure::Disconnected(rank as Rank));
                }
            }

            if let Some(failure) = slot.failure.clone() {
                slot.taken += 1;
                if slot.taken == size {
                    chan.collectives.remove(&seq);
                }
                self.shared.cond.notify_all();
                return Err(failure.into_error());
            }
            if let Some(outputs) = slot.outputs.as_mut() {
                let mine = outputs[me].take().expect("collective output taken twice");
                slot.taken += 1;
                if slot.taken == size {
                    chan.collectives.remove(&seq);
                }
                self.shared.cond.notify_all();
                return Ok(mine);
            }
            state = self.wait_on(state);
        }
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        // Mark the rank dead even when a panicking peer poisoned the lock, so
        // blocked peers get woken instead of suspending forever.
        let mut state = match self.shared.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.alive[self.rank as usize] = false;
        trace!("rank {} disconnected", self.rank);
        drop(state);
        self.shared.cond.notify_all();
    }
}

impl Transport for LocalTransport {
    fn world(&self) -> ChannelId {
        WORLD
    }

    fn duplicate(&self, channel: ChannelId) -> Result<ChannelId> {
        let me = self.rank as usize;
        let size = self.shared.size as usize;
        let mut state = self.lock();

        let (seq, existing) = {
            let chan = state
                .channels
                .get_mut(&channel)
                .ok_or(TransportError::UnknownChannel(channel))?;
            let seq = chan.dup_seq[me];
            chan.dup_seq[me] += 1;
            (seq, chan.dup_children.get(&seq).copied())
        };

        let child = match existing {
            Some(child) => {
                let chan = state
                    .channels
                    .get_mut(&child)
                    .expect("child channel removed before all ranks joined");
                chan.refs += 1;
                chan.joined[me] = true;
                child
            }
            None => {
                let child = ChannelId(state.next_channel);
                state.next_channel += 1;
                state
                    .channels
                    .insert(child, Channel::new(size, Some((channel, seq)), Some(me)));
                state
                    .channels
                    .get_mut(&channel)
                    .expect("parent channel disappeared")
                    .dup_children
                    .insert(seq, child);
                child
            }
        };
        Ok(child)
    }

    fn release(&self, channel: ChannelId) {
        let mut state = self.lock();
        let parent_link = match state.channels.get_mut(&channel) {
            None => return,
            Some(chan) => {
                chan.refs = chan.refs.saturating_sub(1);
                if chan.refs > 0 || !chan.joined.iter().all(|&j| j) {
                    return;
                }
                chan.parent
            }
        };
        state.channels.remove(&channel);
        trace!("removed channel {:?}", channel);
        if let Some((parent, seq)) = parent_link {
            if let Some(parent) = state.channels.get_mut(&parent) {
                parent.dup_children.remove(&seq);
            }
        }
        self.shared.cond.notify_all();
    }

    fn group_size(&self, channel: ChannelId) -> Result<Count> {
        let state = self.lock();
        if !state.channels.contains_key(&channel) {
            return Err(TransportError::UnknownChannel(channel));
        }
        Ok(self.shared.size)
    }

    fn group_rank(&self, channel: ChannelId) -> Result<Rank> {
        let state = self.lock();
        if !state.channels.contains_key(&channel) {
            return Err(TransportError::UnknownChannel(channel));
        }
        Ok(self.rank)
    }

    fn send(&self, channel: ChannelId, dest: Rank, tag: Tag, bytes: &[u8]) -> Result<()> {
        self.check_dest(dest)?;
        self.check_tag(tag)?;
        let mut state = self.lock();
        self.deliver(&mut state, channel, dest, tag, bytes)
    }

    fn probe(&self, channel: ChannelId, source: Rank, tag: Tag) -> Result<Envelope> {
        self.check_source_filter(source)?;
        self.check_tag_filter(tag)?;
        let me = self.rank as usize;
        let mut state = self.lock();
        loop {
            let State {
                ref alive,
                ref channels,
                ..
            } = *state;
            let chan = channels
                .get(&channel)
                .ok_or(TransportError::UnknownChannel(channel))?;
            if let Some(m) = chan.mailboxes[me].iter().find(|m| matches(m, source, tag)) {
                return Ok(Envelope {
                    source: m.source,
                    tag: m.tag,
                    id: m.id,
                });
            }
            if let Some(dead) = self.unreachable_source(alive, source) {
                return Err(TransportError::Disconnected(dead));
            }
            state = self.wait_on(state);
        }
    }

    fn try_probe(&self, channel: ChannelId, source: Rank, tag: Tag) -> Result<Option<Envelope>> {
        self.check_source_filter(source)?;
        self.check_tag_filter(tag)?;
        let me = self.rank as usize;
        let state = self.lock();
        let chan = state
            .channels
            .get(&channel)
            .ok_or(TransportError::UnknownChannel(channel))?;
        Ok(chan.mailboxes[me].iter().find(|m| matches(m, source, tag)).map(
            |m| Envelope {
                source: m.source,
                tag: m.tag,
                id: m.id,
            },
        ))
    }

    fn message_len(&self, channel: ChannelId, message: MessageId) -> Result<usize> {
        let me = self.rank as usize;
        let state = self.lock();
        let chan = state
            .channels
            .get(&channel)
            .ok_or(TransportError::UnknownChannel(channel))?;
        chan.mailboxes[me]
            .iter()
            .find(|m| m.id == message)
            .map(|m| m.payload.len())
            .ok_or(TransportError::UnknownMessage(message))
    }

    fn claim_recv(&self, channel: ChannelId, message: MessageId) -> Result<Vec<u8>> {
        let mut state = self.lock();
        self.remove_message(&mut state, channel, message)
    }

    fn start_send(&self, channel: ChannelId, dest: Rank, tag: Tag, bytes: &[u8]) -> Result<OpId> {
        self.check_dest(dest)?;
        self.check_tag(tag)?;
        let mut state = self.lock();
        self.deliver(&mut state, channel, dest, tag, bytes)?;
        let op = OpId(state.next_op);
        state.next_op += 1;
        state.ops.insert(op, Op::Send);
        Ok(op)
    }

    fn start_claim_recv(&self, channel: ChannelId, message: MessageId) -> Result<OpId> {
        let mut state = self.lock();
        let payload = self.remove_message(&mut state, channel, message)?;
        let op = OpId(state.next_op);
        state.next_op += 1;
        state.ops.insert(op, Op::Recv { payload });
        Ok(op)
    }

    fn op_test(&self, op: OpId) -> Result<bool> {
        let state = self.lock();
        if !state.ops.contains_key(&op) {
            return Err(TransportError::UnknownOp(op));
        }
        // Buffered delivery completes operations at creation.
        Ok(true)
    }

    fn op_wait(&self, op: OpId) -> Result<Vec<u8>> {
        let mut state = self.lock();
        match state.ops.remove(&op) {
            None => Err(TransportError::UnknownOp(op)),
            Some(Op::Send) => Ok(Vec::new()),
            Some(Op::Recv { payload }) => Ok(payload),
        }
    }

    fn op_cancel(&self, op: OpId) {
        let mut state = self.lock();
        if state.ops.remove(&op).is_some() {
            trace!("rank {} cancelled operation {:?}", self.rank, op);
        }
    }

    fn barrier(&self, channel: ChannelId) -> Result<()> {
        self.collective(channel, CollectiveKind::Barrier, Vec::new(), Vec::new(), Vec::new())?;
        Ok(())
    }

    fn all_to_all(&self, channel: ChannelId, send: &[u8]) -> Result<Vec<u8>> {
        self.collective(
            channel,
            CollectiveKind::AllToAll,
            send.to_vec(),
            Vec::new(),
            Vec::new(),
        )
    }

    fn all_gather(&self, channel: ChannelId, send: &[u8]) -> Result<Vec<u8>> {
        self.collective(
            channel,
            CollectiveKind::AllGather,
            send.to_vec(),
            Vec::new(),
            Vec::new(),
        )
    }

    fn all_gather_varcount(
        &self,
        channel: ChannelId,
        send: &[u8],
        counts: &[usize],
        displs: &[usize],
    ) -> Result<Vec<u8>> {
        self.collective(
            channel,
            CollectiveKind::AllGatherVar,
            send.to_vec(),
            counts.to_vec(),
            displs.to_vec(),
        )
    }
}

/// Runs one closure per rank of a `size`-rank group, each on its own thread
/// with its own [`Universe`].
///
/// Returns when every rank's closure has finished. A panic on any rank
/// propagates after the group is torn down.
pub fn run_group<F>(size: usize, f: F)
where
    F: Fn(Universe) + Send + Sync,
{
    let endpoints = LocalTransport::group(size);
    std::thread::scope(|s| {
        let f = &f;
        for endpoint in endpoints {
            s.spawn(move || f(initialize(Arc::new(endpoint))));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_send_probe_and_claim() {
        let eps = LocalTransport::group(2);
        let world = eps[0].world();
        eps[0].send(world, 1, 3, b"abc").unwrap();

        let env = eps[1].try_probe(world, ANY_SOURCE, ANY_TAG).unwrap().unwrap();
        assert_eq!(env.source, 0);
        assert_eq!(env.tag, 3);
        assert_eq!(eps[1].message_len(world, env.id).unwrap(), 3);

        assert_eq!(eps[1].claim_recv(world, env.id).unwrap(), b"abc");
        assert!(eps[1].try_probe(world, ANY_SOURCE, ANY_TAG).unwrap().is_none());
        assert!(matches!(
            eps[1].message_len(world, env.id),
            Err(TransportError::UnknownMessage(_))
        ));
    }

    #[test]
    fn matching_respects_filters_and_arrival_order() {
        let eps = LocalTransport::group(3);
        let world = eps[0].world();
        eps[0].send(world, 2, 1, b"first").unwrap();
        eps[1].send(world, 2, 9, b"other tag").unwrap();
        eps[0].send(world, 2, 1, b"second").unwrap();

        // Wildcards match the earliest arrival.
        let env = eps[2].try_probe(world, ANY_SOURCE, ANY_TAG).unwrap().unwrap();
        assert_eq!(eps[2].claim_recv(world, env.id).unwrap(), b"first");

        // Tag filter skips ahead to the matching message.
        let env = eps[2].try_probe(world, ANY_SOURCE, 1).unwrap().unwrap();
        assert_eq!(eps[2].claim_recv(world, env.id).unwrap(), b"second");

        let env = eps[2].try_probe(world, 1, ANY_TAG).unwrap().unwrap();
        assert_eq!(eps[2].claim_recv(world, env.id).unwrap(), b"other tag");
    }

    #[test]
    fn duplication_agrees_across_ranks() {
        let eps = LocalTransport::group(2);
        let world = eps[0].world();
        let a = eps[0].duplicate(world).unwrap();
        let b = eps[1].duplicate(world).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, world);

        // A second round of duplication yields a different channel.
        let c = eps[0].duplicate(world).unwrap();
        let d = eps[1].duplicate(world).unwrap();
        assert_eq!(c, d);
        assert_ne!(a, c);
    }

    #[test]
    fn duplicated_channels_are_isolated() {
        let eps = LocalTransport::group(2);
        let world = eps[0].world();
        let dup = eps[0].duplicate(world).unwrap();
        eps[1].duplicate(world).unwrap();

        eps[0].send(dup, 1, 0, b"on the duplicate").unwrap();
        assert!(eps[1].try_probe(world, ANY_SOURCE, ANY_TAG).unwrap().is_none());
        assert!(eps[1].try_probe(dup, ANY_SOURCE, ANY_TAG).unwrap().is_some());
    }

    #[test]
    fn channel_removed_after_all_ranks_release() {
        let eps = LocalTransport::group(2);
        let world = eps[0].world();
        let dup = eps[0].duplicate(world).unwrap();
        eps[1].duplicate(world).unwrap();

        eps[0].release(dup);
        assert!(eps[1].group_size(dup).is_ok());
        eps[1].release(dup);
        assert!(matches!(
            eps[0].group_size(dup),
            Err(TransportError::UnknownChannel(_))
        ));
    }

    #[test]
    fn invalid_destination_and_tag_are_rejected() {
        let eps = LocalTransport::group(2);
        let world = eps[0].world();
        assert!(matches!(
            eps[0].send(world, 5, 0, b"x"),
            Err(TransportError::InvalidRank { rank: 5, .. })
        ));
        assert!(matches!(
            eps[0].send(world, -1, 0, b"x"),
            Err(TransportError::InvalidRank { .. })
        ));
        assert!(matches!(
            eps[0].send(world, 1, -4, b"x"),
            Err(TransportError::InvalidTag(-4))
        ));
        assert!(matches!(
            eps[0].try_probe(world, 7, ANY_TAG),
            Err(TransportError::InvalidRank { rank: 7, .. })
        ));
    }

    #[test]
    fn ops_resolve_exactly_once() {
        let eps = LocalTransport::group(2);
        let world = eps[0].world();
        let op = eps[0].start_send(world, 1, 0, b"payload").unwrap();
        assert!(eps[0].op_test(op).unwrap());
        assert!(eps[0].op_test(op).unwrap());
        assert_eq!(eps[0].op_wait(op).unwrap(), b"");
        assert!(matches!(
            eps[0].op_wait(op),
            Err(TransportError::UnknownOp(_))
        ));

        let env = eps[1].try_probe(world, 0, ANY_TAG).unwrap().unwrap();
        let op = eps[1].start_claim_recv(world, env.id).unwrap();
        assert_eq!(eps[1].op_wait(op).unwrap(), b"payload");
    }

    #[test]
    fn cancelled_recv_drops_the_message() {
        let eps = LocalTransport::group(2);
        let world = eps[0].world();
        eps[0].send(world, 1, 0, b"doomed").unwrap();

        let env = eps[1].try_probe(world, ANY_SOURCE, ANY_TAG).unwrap().unwrap();
        let op = eps[1].start_claim_recv(world, env.id).unwrap();
        eps[1].op_cancel(op);
        // Idempotent.
        eps[1].op_cancel(op);

        assert!(eps[1].try_probe(world, ANY_SOURCE, ANY_TAG).unwrap().is_none());
    }

    #[test]
    fn blocking_probe_fails_when_peer_disconnects() {
        let eps = LocalTransport::group(2);
        let world = eps[0].world();
        let mut eps = eps;
        let ep1 = eps.pop().unwrap();
        drop(eps.pop().unwrap());

        assert!(matches!(
            ep1.probe(world, 0, ANY_TAG),
            Err(TransportError::Disconnected(0))
        ));
    }
}
