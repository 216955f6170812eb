// Round outcome resolution and match scoring.
//
// `RoundResolver` is the one place that decides who won a round. The host
// feeds it every claim in the order the claims arrive over the network; the
// first claim that resolves to a winner locks the round, and every later
// claim for the same round is answered with `Ignored::Locked`. A round is
// either free-for-all (maze race: any participant may claim) or a duel
// between two contestants (quick-draw, pong).
//
// Quick-draw has an extra rule: a hit reported before the host revealed the
// signal is a false start and awards the round to the opponent. The host
// records the reveal time via `mark_signal`; a `Hit` arriving while no signal
// has been marked is treated as `FalseStart`.
//
// Reported reaction times are carried through for logging only. Arrival
// order at the host is the tie-breaker, never the client's own timestamp.
//
// `ScoreTable` keeps per-participant points for one match and reports when
// an award reaches the match target.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What a participant claims happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Claim {
    ReachedGoal,
    Hit { reported_ms: Option<u64> },
    FalseStart,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WinReason<Id> {
    Goal,
    Hit,
    FalseStart { by: Id },
    Forfeit { by: Id },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ignored {
    /// The round already has a winner, or is not open.
    Locked,
    /// The claimant is not one of this duel's contestants.
    NotContestant,
    /// A false start in a free-for-all: there is no opponent to award.
    NoOpponent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict<Id> {
    Winner { winner: Id, reason: WinReason<Id> },
    Ignored(Ignored),
}

#[derive(Clone, Debug)]
pub struct RoundResolver<Id> {
    locked: bool,
    contestants: Option<[Id; 2]>,
    signal_at_ms: Option<u64>,
}

impl<Id: Clone + PartialEq> Default for RoundResolver<Id> {
    fn default() -> Self {
        Self::closed()
    }
}

impl<Id: Clone + PartialEq> RoundResolver<Id> {
    /// A resolver that accepts nothing. Used between rounds.
    pub fn closed() -> Self {
        Self {
            locked: true,
            contestants: None,
            signal_at_ms: None,
        }
    }

    pub fn open_free_for_all() -> Self {
        Self {
            locked: false,
            contestants: None,
            signal_at_ms: None,
        }
    }

    pub fn open_duel(a: Id, b: Id) -> Self {
        Self {
            locked: false,
            contestants: Some([a, b]),
            signal_at_ms: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn contestants(&self) -> Option<&[Id; 2]> {
        self.contestants.as_ref()
    }

    pub fn signal_at_ms(&self) -> Option<u64> {
        self.signal_at_ms
    }

    /// Record the moment the quick-draw signal was revealed.
    pub fn mark_signal(&mut self, now_ms: u64) {
        if self.signal_at_ms.is_none() {
            self.signal_at_ms = Some(now_ms);
        }
    }

    fn opponent_of(&self, id: &Id) -> Option<Id> {
        let [a, b] = self.contestants.as_ref()?;
        if a == id {
            Some(b.clone())
        } else if b == id {
            Some(a.clone())
        } else {
            None
        }
    }

    /// Decide a claim. The first claim that yields a winner locks the round.
    pub fn resolve(&mut self, claimant: &Id, claim: Claim, now_ms: u64) -> Verdict<Id> {
        if self.locked {
            return Verdict::Ignored(Ignored::Locked);
        }
        if self.contestants.is_some() && self.opponent_of(claimant).is_none() {
            return Verdict::Ignored(Ignored::NotContestant);
        }
        let early_hit = matches!(claim, Claim::Hit { .. })
            && match self.signal_at_ms {
                Some(at) => now_ms < at,
                None => true,
            };
        let verdict = match claim {
            Claim::ReachedGoal => Verdict::Winner {
                winner: claimant.clone(),
                reason: WinReason::Goal,
            },
            Claim::Hit { .. } if !early_hit => Verdict::Winner {
                winner: claimant.clone(),
                reason: WinReason::Hit,
            },
            Claim::Hit { .. } | Claim::FalseStart => match self.opponent_of(claimant) {
                Some(opponent) => Verdict::Winner {
                    winner: opponent,
                    reason: WinReason::FalseStart {
                        by: claimant.clone(),
                    },
                },
                None => Verdict::Ignored(Ignored::NoOpponent),
            },
        };
        if matches!(verdict, Verdict::Winner { .. }) {
            self.locked = true;
        }
        verdict
    }

    /// Stop accepting claims without picking a winner.
    pub fn lock(&mut self) {
        self.locked = true;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Award {
    /// New score, match continues.
    Continue(u32),
    /// New score, which reached the target.
    MatchPoint(u32),
}

/// Per-match scores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreTable<Id: Ord> {
    scores: BTreeMap<Id, u32>,
    target: u32,
}

impl<Id: Ord + Clone> ScoreTable<Id> {
    pub fn new(target: u32) -> Self {
        Self {
            scores: BTreeMap::new(),
            target: target.max(1),
        }
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    /// Make sure `id` has an entry (at zero if new).
    pub fn insert(&mut self, id: Id) {
        self.scores.entry(id).or_insert(0);
    }

    pub fn remove(&mut self, id: &Id) {
        self.scores.remove(id);
    }

    pub fn get(&self, id: &Id) -> u32 {
        self.scores.get(id).copied().unwrap_or(0)
    }

    pub fn award(&mut self, id: &Id) -> Award {
        let score = self.scores.entry(id.clone()).or_insert(0);
        *score += 1;
        if *score >= self.target {
            Award::MatchPoint(*score)
        } else {
            Award::Continue(*score)
        }
    }

    /// Zero every score, keeping the entries.
    pub fn reset(&mut self) {
        for score in self.scores.values_mut() {
            *score = 0;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Id, u32)> {
        self.scores.iter().map(|(id, s)| (id, *s))
    }

    pub fn to_map(&self) -> BTreeMap<Id, u32> {
        self.scores.clone()
    }
}
