//! Matchmaker: public FIFO queue and private invite index.
//!
//! The queue is strict FIFO; no priority, no skill matching.
//! Private rooms are addressed by a short access code that stays
//! resolvable for the life of the room, while the open-invite flag is
//! cleared the moment the guest slot fills.

use std::collections::{HashMap, VecDeque};

use merels_shared::protocol::{AccessCode, RoomId};
use rand::Rng;
use rand::rngs::StdRng;

use super::registry::ConnectionId;

/// Length of generated access codes.
pub const CODE_LENGTH: usize = 6;

/// Code alphabet without easily-confused characters (no 0/O, 1/I).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Result of a public enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enqueue {
    /// Still waiting, at this 1-based queue position.
    Queued { position: usize },
    /// Two waiters drained oldest-first; the earlier enqueue is the host.
    Paired {
        host: ConnectionId,
        guest: ConnectionId,
    },
}

#[derive(Debug, Clone)]
struct Waiting {
    conn: ConnectionId,
    enqueued_at: i64,
}

#[derive(Debug, Clone)]
struct Invite {
    room: RoomId,
    open: bool,
}

/// Pairs waiting participants into rooms.
pub struct Matchmaker {
    queue: VecDeque<Waiting>,
    /// Live access codes, kept until the room is destroyed so the code
    /// remains a valid room lookup even after the invite closes.
    codes: HashMap<AccessCode, Invite>,
    rng: StdRng,
}

impl Matchmaker {
    pub fn new(rng: StdRng) -> Self {
        Self {
            queue: VecDeque::new(),
            codes: HashMap::new(),
            rng,
        }
    }

    /// Append to the FIFO; drains the two oldest entries the moment the
    /// queue reaches two. Re-enqueueing a waiting connection just reports
    /// its current position.
    pub fn enqueue_public(&mut self, conn: ConnectionId, now: i64) -> Enqueue {
        if let Some(position) = self.queue.iter().position(|w| w.conn == conn) {
            return Enqueue::Queued {
                position: position + 1,
            };
        }
        self.queue.push_back(Waiting {
            conn,
            enqueued_at: now,
        });
        if self.queue.len() >= 2 {
            // Queue length only ever reaches two here, so both pops succeed.
            let host = self.queue.pop_front().map(|w| w.conn);
            let guest = self.queue.pop_front().map(|w| w.conn);
            match (host, guest) {
                (Some(host), Some(guest)) => Enqueue::Paired { host, guest },
                _ => unreachable!("queue drained below two entries"),
            }
        } else {
            Enqueue::Queued {
                position: self.queue.len(),
            }
        }
    }

    /// Put a connection back at the head of the queue without triggering
    /// pairing. Used when a pairing raced a disconnect; the survivor keeps
    /// their place in line and pairs on the next enqueue.
    pub fn requeue_front(&mut self, conn: ConnectionId, now: i64) -> usize {
        self.queue.retain(|w| w.conn != conn);
        self.queue.push_front(Waiting {
            conn,
            enqueued_at: now,
        });
        1
    }

    /// Remove a connection from the public queue; no-op otherwise.
    pub fn cancel(&mut self, conn: ConnectionId) {
        self.queue.retain(|w| w.conn != conn);
    }

    /// Number of participants currently waiting for a public pairing.
    pub fn waiting(&self) -> usize {
        self.queue.len()
    }

    /// Oldest enqueue timestamp, for diagnostics.
    pub fn oldest_waiting_since(&self) -> Option<i64> {
        self.queue.front().map(|w| w.enqueued_at)
    }

    /// Generate a fresh code for a private room and index it as an open
    /// invite. Collision-checked against currently live codes only;
    /// codes of destroyed rooms may be reused.
    pub fn register_invite(&mut self, room: RoomId) -> AccessCode {
        let code = loop {
            let candidate = Self::random_code(&mut self.rng);
            if !self.codes.contains_key(&candidate) {
                break candidate;
            }
        };
        self.codes.insert(code.clone(), Invite { room, open: true });
        code
    }

    fn random_code(rng: &mut StdRng) -> AccessCode {
        let code: String = (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        AccessCode::new(code)
    }

    /// Resolve a code to its room, with whether the invite is still open.
    pub fn resolve(&self, code: &AccessCode) -> Option<(RoomId, bool)> {
        self.codes.get(code).map(|inv| (inv.room, inv.open))
    }

    /// Mark an invite as filled; the code keeps resolving to the room.
    pub fn close_invite(&mut self, code: &AccessCode) {
        if let Some(invite) = self.codes.get_mut(code) {
            invite.open = false;
        }
    }

    /// Drop a code entirely when its room is destroyed.
    pub fn release_code(&mut self, code: &AccessCode) {
        self.codes.remove(code);
    }

    /// Number of open invites, for diagnostics.
    pub fn open_invites(&self) -> usize {
        self.codes.values().filter(|inv| inv.open).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn matchmaker() -> Matchmaker {
        Matchmaker::new(StdRng::seed_from_u64(42))
    }

    #[test]
    fn test_first_enqueue_waits_at_position_one() {
        let mut mm = matchmaker();
        let p1 = ConnectionId::new();
        assert_eq!(mm.enqueue_public(p1, 0), Enqueue::Queued { position: 1 });
        assert_eq!(mm.waiting(), 1);
    }

    #[test]
    fn test_second_enqueue_pairs_fifo_with_earlier_as_host() {
        let mut mm = matchmaker();
        let p1 = ConnectionId::new();
        let p2 = ConnectionId::new();
        mm.enqueue_public(p1, 0);
        assert_eq!(
            mm.enqueue_public(p2, 1),
            Enqueue::Paired {
                host: p1,
                guest: p2
            }
        );
        assert_eq!(mm.waiting(), 0);
    }

    #[test]
    fn test_four_enqueues_pair_in_arrival_order() {
        let mut mm = matchmaker();
        let conns: Vec<_> = (0..4).map(|_| ConnectionId::new()).collect();
        mm.enqueue_public(conns[0], 0);
        let first = mm.enqueue_public(conns[1], 1);
        mm.enqueue_public(conns[2], 2);
        let second = mm.enqueue_public(conns[3], 3);
        assert_eq!(
            first,
            Enqueue::Paired {
                host: conns[0],
                guest: conns[1]
            }
        );
        assert_eq!(
            second,
            Enqueue::Paired {
                host: conns[2],
                guest: conns[3]
            }
        );
    }

    #[test]
    fn test_reenqueue_reports_current_position_without_duplicate() {
        let mut mm = matchmaker();
        let p1 = ConnectionId::new();
        mm.enqueue_public(p1, 0);
        assert_eq!(mm.enqueue_public(p1, 5), Enqueue::Queued { position: 1 });
        assert_eq!(mm.waiting(), 1);
    }

    #[test]
    fn test_cancel_removes_from_queue() {
        let mut mm = matchmaker();
        let p1 = ConnectionId::new();
        let p2 = ConnectionId::new();
        mm.enqueue_public(p1, 0);
        mm.cancel(p1);
        assert_eq!(mm.waiting(), 0);
        // p2 now waits instead of pairing with the cancelled p1.
        assert_eq!(mm.enqueue_public(p2, 1), Enqueue::Queued { position: 1 });
    }

    #[test]
    fn test_cancel_unknown_connection_is_noop() {
        let mut mm = matchmaker();
        mm.cancel(ConnectionId::new());
        assert_eq!(mm.waiting(), 0);
    }

    #[test]
    fn test_invite_codes_are_fixed_length_and_unique_while_live() {
        let mut mm = matchmaker();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            let code = mm.register_invite(RoomId::new());
            assert_eq!(code.as_str().len(), CODE_LENGTH);
            assert!(
                code.as_str()
                    .chars()
                    .all(|c| CODE_ALPHABET.contains(&(c as u8)))
            );
            assert!(seen.insert(code));
        }
    }

    #[test]
    fn test_invite_lifecycle() {
        let mut mm = matchmaker();
        let room = RoomId::new();
        let code = mm.register_invite(room);

        assert_eq!(mm.resolve(&code), Some((room, true)));
        assert_eq!(mm.open_invites(), 1);

        mm.close_invite(&code);
        // Closed invites still resolve to the room until it is destroyed.
        assert_eq!(mm.resolve(&code), Some((room, false)));
        assert_eq!(mm.open_invites(), 0);

        mm.release_code(&code);
        assert_eq!(mm.resolve(&code), None);
    }
}
