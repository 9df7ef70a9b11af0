//! Communication between the ranks of a distributed run.
//!
//! Every rank counts successes for its own slice of the trials. At the end
//! of each table the counter vectors are summed element-wise onto the root
//! rank, which alone writes results. Three worlds are provided: a single
//! process, ranks as threads of one process joined by channels, and ranks
//! as separate processes joined by TCP.
//!
//! The TCP wire format is little-endian throughout. A peer opens with a
//! handshake of three `u32` words (magic, rank, world size); each reduction
//! then sends one frame, a `u32` element count followed by that many `u64`
//! counters.

use fsim_common::wire::{CONNECT_TIMEOUT_SECS, HANDSHAKE_MAGIC, ROOT_RANK};
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CommError {
    #[error("invalid world: rank {rank} of {size}")]
    InvalidWorld { rank: usize, size: usize },
    #[error("I/O error with rank {rank}: {source}")]
    Io {
        rank: usize,
        #[source]
        source: io::Error,
    },
    #[error("handshake rejected: {0}")]
    Handshake(String),
    #[error("rank {rank} sent {got} counters, expected {expected}")]
    LengthMismatch {
        rank: usize,
        got: usize,
        expected: usize,
    },
    #[error("rank {0} left the world")]
    Disconnected(usize),
}

/// A rank's view of the world it belongs to.
pub trait Communicator {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn is_root(&self) -> bool {
        self.rank() == ROOT_RANK
    }

    /// Sums `local` element-wise over all ranks.
    ///
    /// Every rank must call this the same number of times with vectors of
    /// equal length. The root receives `Some(total)`; the other ranks get
    /// `None` once their contribution is handed off.
    fn reduce_sum(&mut self, local: &[u64]) -> Result<Option<Vec<u64>>, CommError>;
}

fn check_world(rank: usize, size: usize) -> Result<(), CommError> {
    if size == 0 || rank >= size {
        return Err(CommError::InvalidWorld { rank, size });
    }
    Ok(())
}

fn accumulate(total: &mut [u64], part: &[u64], rank: usize) -> Result<(), CommError> {
    if part.len() != total.len() {
        return Err(CommError::LengthMismatch {
            rank,
            got: part.len(),
            expected: total.len(),
        });
    }
    for (t, p) in total.iter_mut().zip(part) {
        *t += p;
    }
    Ok(())
}

/// The world of a single process.
#[derive(Debug, Default, Clone, Copy)]
pub struct Solo;

impl Communicator for Solo {
    fn rank(&self) -> usize {
        ROOT_RANK
    }

    fn size(&self) -> usize {
        1
    }

    fn reduce_sum(&mut self, local: &[u64]) -> Result<Option<Vec<u64>>, CommError> {
        Ok(Some(local.to_vec()))
    }
}

enum Link {
    Root(Vec<Receiver<Vec<u64>>>),
    Peer(Sender<Vec<u64>>),
}

/// One rank of an in-process world whose ranks run on separate threads.
pub struct LocalRank {
    rank: usize,
    size: usize,
    link: Link,
}

/// Builds an in-process world of `size` ranks.
///
/// The returned ranks are ordered by rank and are meant to be moved onto
/// one thread each. Every peer owns a dedicated channel to the root, so
/// contributions are matched to reductions in the order they were sent.
///
/// # Panics
///
/// Panics if `size` is zero.
pub fn local_world(size: usize) -> Vec<LocalRank> {
    assert!(size > 0, "a world needs at least one rank");
    let (senders, receivers): (Vec<_>, Vec<_>) = (1..size).map(|_| mpsc::channel()).unzip();

    let mut ranks = Vec::with_capacity(size);
    ranks.push(LocalRank {
        rank: ROOT_RANK,
        size,
        link: Link::Root(receivers),
    });
    for (i, sender) in senders.into_iter().enumerate() {
        ranks.push(LocalRank {
            rank: i + 1,
            size,
            link: Link::Peer(sender),
        });
    }
    ranks
}

impl Communicator for LocalRank {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn reduce_sum(&mut self, local: &[u64]) -> Result<Option<Vec<u64>>, CommError> {
        match &self.link {
            Link::Root(peers) => {
                let mut total = local.to_vec();
                for (i, peer) in peers.iter().enumerate() {
                    let rank = i + 1;
                    let part = peer.recv().map_err(|_| CommError::Disconnected(rank))?;
                    accumulate(&mut total, &part, rank)?;
                }
                Ok(Some(total))
            }
            Link::Peer(root) => {
                root.send(local.to_vec())
                    .map_err(|_| CommError::Disconnected(ROOT_RANK))?;
                Ok(None)
            }
        }
    }
}

/// One rank of a world whose ranks are separate processes.
///
/// The root listens for every other rank; peers hold a single stream to
/// the root. Streams of the root are kept in rank order.
pub struct TcpWorld {
    rank: usize,
    size: usize,
    streams: Vec<TcpStream>,
}

fn read_u32(stream: &mut TcpStream) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(stream: &mut TcpStream) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    stream.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

impl TcpWorld {
    /// Joins a world at `addr` as `rank` of `size`.
    ///
    /// The root binds `addr` and waits for every peer; peers connect to it.
    pub fn establish(rank: usize, size: usize, addr: &str) -> Result<Self, CommError> {
        check_world(rank, size)?;
        if rank == ROOT_RANK {
            let listener =
                TcpListener::bind(addr).map_err(|source| CommError::Io { rank, source })?;
            Self::accept_peers(listener, size)
        } else {
            Self::connect_to_root(rank, size, addr)
        }
    }

    /// Builds the root rank from a bound listener, accepting `size - 1`
    /// peers in any order.
    pub fn accept_peers(listener: TcpListener, size: usize) -> Result<Self, CommError> {
        check_world(ROOT_RANK, size)?;
        info!(peers = size - 1, "waiting for peer ranks");

        let mut slots: Vec<Option<TcpStream>> = (1..size).map(|_| None).collect();
        for _ in 1..size {
            let (mut stream, from) = listener.accept().map_err(|source| CommError::Io {
                rank: ROOT_RANK,
                source,
            })?;
            let io_err = |source| CommError::Io {
                rank: ROOT_RANK,
                source,
            };
            stream.set_nodelay(true).map_err(io_err)?;

            let magic = read_u32(&mut stream).map_err(io_err)?;
            let peer_rank = read_u32(&mut stream).map_err(io_err)? as usize;
            let peer_size = read_u32(&mut stream).map_err(io_err)? as usize;
            if magic != HANDSHAKE_MAGIC {
                return Err(CommError::Handshake(format!("bad magic {magic:#010x} from {from}")));
            }
            if peer_size != size {
                return Err(CommError::Handshake(format!(
                    "rank {peer_rank} expects a world of {peer_size}, root has {size}"
                )));
            }
            if peer_rank == ROOT_RANK || peer_rank >= size {
                return Err(CommError::Handshake(format!("invalid peer rank {peer_rank}")));
            }
            let slot = &mut slots[peer_rank - 1];
            if slot.is_some() {
                return Err(CommError::Handshake(format!("rank {peer_rank} joined twice")));
            }
            debug!(rank = peer_rank, %from, "peer joined");
            *slot = Some(stream);
        }

        Ok(Self {
            rank: ROOT_RANK,
            size,
            streams: slots.into_iter().flatten().collect(),
        })
    }

    /// Connects a peer rank to the root, retrying until the root listens or
    /// the connect timeout expires.
    pub fn connect_to_root<A: ToSocketAddrs>(
        rank: usize,
        size: usize,
        addr: A,
    ) -> Result<Self, CommError> {
        check_world(rank, size)?;
        if rank == ROOT_RANK {
            return Err(CommError::InvalidWorld { rank, size });
        }
        let io_err = |source| CommError::Io { rank, source };

        let deadline = Instant::now() + Duration::from_secs(CONNECT_TIMEOUT_SECS);
        let mut stream = loop {
            match TcpStream::connect(&addr) {
                Ok(stream) => break stream,
                Err(e) if Instant::now() < deadline => {
                    debug!(rank, error = %e, "root not reachable yet, retrying");
                    thread::sleep(Duration::from_millis(100));
                }
                Err(e) => return Err(io_err(e)),
            }
        };
        stream.set_nodelay(true).map_err(io_err)?;

        let mut hello = Vec::with_capacity(12);
        for word in [HANDSHAKE_MAGIC, rank as u32, size as u32] {
            hello.extend_from_slice(&word.to_le_bytes());
        }
        stream.write_all(&hello).map_err(io_err)?;

        Ok(Self {
            rank,
            size,
            streams: vec![stream],
        })
    }
}

impl Communicator for TcpWorld {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn reduce_sum(&mut self, local: &[u64]) -> Result<Option<Vec<u64>>, CommError> {
        if self.rank != ROOT_RANK {
            let mut frame = Vec::with_capacity(4 + 8 * local.len());
            frame.extend_from_slice(&(local.len() as u32).to_le_bytes());
            for value in local {
                frame.extend_from_slice(&value.to_le_bytes());
            }
            let rank = self.rank;
            self.streams[0]
                .write_all(&frame)
                .map_err(|source| CommError::Io { rank, source })?;
            return Ok(None);
        }

        let mut total = local.to_vec();
        let mut part = Vec::with_capacity(local.len());
        for (i, stream) in self.streams.iter_mut().enumerate() {
            let rank = i + 1;
            let io_err = |source: io::Error| match source.kind() {
                io::ErrorKind::UnexpectedEof => CommError::Disconnected(rank),
                _ => CommError::Io { rank, source },
            };
            let len = read_u32(stream).map_err(io_err)? as usize;
            part.clear();
            for _ in 0..len {
                part.push(read_u64(stream).map_err(io_err)?);
            }
            accumulate(&mut total, &part, rank)?;
        }
        Ok(Some(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solo_returns_its_own_counts() {
        let mut solo = Solo;
        assert!(solo.is_root());
        assert_eq!(solo.reduce_sum(&[1, 2, 3]).unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn local_world_sums_onto_root() {
        let world = local_world(4);
        let totals: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = world
                .into_iter()
                .map(|mut rank| {
                    s.spawn(move || {
                        let r = rank.rank() as u64;
                        let first = rank.reduce_sum(&[r, 1]).unwrap();
                        let second = rank.reduce_sum(&[10 * r]).unwrap();
                        (first, second)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(totals[0], (Some(vec![6, 4]), Some(vec![60])));
        assert!(totals[1..].iter().all(|t| *t == (None, None)));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut world = local_world(2);
        let mut peer = world.pop().unwrap();
        let mut root = world.pop().unwrap();
        peer.reduce_sum(&[1, 2, 3]).unwrap();
        assert!(matches!(
            root.reduce_sum(&[1, 2]),
            Err(CommError::LengthMismatch { rank: 1, got: 3, expected: 2 })
        ));
    }

    #[test]
    fn tcp_world_sums_onto_root() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let size = 3;

        let total = thread::scope(|s| {
            for rank in 1..size {
                s.spawn(move || {
                    let mut peer = TcpWorld::connect_to_root(rank, size, addr).unwrap();
                    assert_eq!(peer.reduce_sum(&[rank as u64, 5]).unwrap(), None);
                });
            }
            let mut root = TcpWorld::accept_peers(listener, size).unwrap();
            assert_eq!(root.size(), size);
            root.reduce_sum(&[100, 0]).unwrap()
        });
        assert_eq!(total, Some(vec![103, 10]));
    }

    /// Connects and reduces every peer in `order` before the root accepts,
    /// so contributions reach the root in that order.
    fn tcp_total_with_arrival_order(order: &[usize]) -> Option<Vec<u64>> {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let size = order.len() + 1;

        let mut peers = Vec::new();
        for &rank in order {
            let mut peer = TcpWorld::connect_to_root(rank, size, addr).unwrap();
            let r = rank as u64;
            assert_eq!(peer.reduce_sum(&[r, r * r, 1]).unwrap(), None);
            peers.push(peer);
        }

        let mut root = TcpWorld::accept_peers(listener, size).unwrap();
        root.reduce_sum(&[7, 0, 1]).unwrap()
    }

    #[test]
    fn totals_do_not_depend_on_arrival_order() {
        let expected = Some(vec![7 + 1 + 2 + 3 + 4, 1 + 4 + 9 + 16, 5]);
        for order in [[1, 2, 3, 4], [4, 3, 2, 1], [3, 1, 4, 2]] {
            assert_eq!(tcp_total_with_arrival_order(&order), expected, "order {order:?}");
        }
    }

    #[test]
    fn local_totals_do_not_depend_on_send_order() {
        let mut world = local_world(4);
        let mut root = world.remove(0);
        // peers hand off in reverse rank order
        for mut peer in world.into_iter().rev() {
            let r = peer.rank() as u64;
            assert_eq!(peer.reduce_sum(&[r, 2]).unwrap(), None);
        }
        assert_eq!(root.reduce_sum(&[0, 2]).unwrap(), Some(vec![6, 8]));
    }

    #[test]
    fn rejects_invalid_worlds() {
        assert!(matches!(
            TcpWorld::establish(2, 2, "127.0.0.1:0"),
            Err(CommError::InvalidWorld { rank: 2, size: 2 })
        ));
    }
}
