// Single-elimination bracket for duel modes (quick-draw, pong).
//
// Entrants are shuffled with the seeded generator and paired in order. An odd
// entrant out gets a bye and advances without playing. Each `Bracket` value is
// one bracket round; when every entry has a winner, `advance` either builds
// the next round from the winners (in entry order) or names the champion.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use arcade_prng::Mulberry32;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketEntry<Id> {
    pub left: Id,
    /// `None` is a bye.
    pub right: Option<Id>,
    pub winner: Option<Id>,
}

impl<Id: Clone + PartialEq> BracketEntry<Id> {
    fn new(left: Id, right: Option<Id>) -> Self {
        let winner = match right {
            None => Some(left.clone()),
            Some(_) => None,
        };
        Self {
            left,
            right,
            winner,
        }
    }

    pub fn is_bye(&self) -> bool {
        self.right.is_none()
    }

    pub fn involves(&self, id: &Id) -> bool {
        self.left == *id || self.right.as_ref() == Some(id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket<Id> {
    /// 1-based bracket round.
    pub round: u32,
    pub entries: Vec<BracketEntry<Id>>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BracketError {
    #[error("no bracket entry at index {0}")]
    NoSuchEntry(usize),
    #[error("bracket entry {0} already has a winner")]
    AlreadyDecided(usize),
    #[error("winner is not a contestant of entry {0}")]
    NotAContestant(usize),
}

pub enum Progress<Id> {
    Next(Bracket<Id>),
    Champion(Id),
}

impl<Id: Clone + PartialEq> Bracket<Id> {
    /// Build the first round. Returns `None` with fewer than two entrants.
    pub fn seeded(mut entrants: Vec<Id>, rng: &mut Mulberry32) -> Option<Self> {
        if entrants.len() < 2 {
            return None;
        }
        rng.shuffle(&mut entrants);
        Some(Self::paired(1, entrants))
    }

    fn paired(round: u32, ids: Vec<Id>) -> Self {
        let mut entries = Vec::with_capacity(ids.len().div_ceil(2));
        let mut iter = ids.into_iter();
        while let Some(left) = iter.next() {
            entries.push(BracketEntry::new(left, iter.next()));
        }
        Self { round, entries }
    }

    /// Index of the first entry still waiting for a result.
    pub fn next_pending(&self) -> Option<usize> {
        self.entries.iter().position(|e| e.winner.is_none())
    }

    pub fn record_winner(&mut self, index: usize, winner: Id) -> Result<(), BracketError> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(BracketError::NoSuchEntry(index))?;
        if entry.winner.is_some() {
            return Err(BracketError::AlreadyDecided(index));
        }
        if !entry.involves(&winner) {
            return Err(BracketError::NotAContestant(index));
        }
        entry.winner = Some(winner);
        Ok(())
    }

    /// Remove a participant who left. Any undecided entry they were in is
    /// awarded to their opponent; returns the index of that entry, if any.
    pub fn withdraw(&mut self, id: &Id) -> Option<usize> {
        let index = self
            .entries
            .iter()
            .position(|e| e.winner.is_none() && e.involves(id))?;
        let entry = &mut self.entries[index];
        let other = if entry.left == *id {
            entry.right.clone()
        } else {
            Some(entry.left.clone())
        };
        entry.winner = other;
        Some(index)
    }

    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| e.winner.is_some())
    }

    /// Build the next round from this round's winners, or name the champion.
    /// Returns `None` if the round is not complete.
    pub fn advance(&self) -> Option<Progress<Id>> {
        let winners: Vec<Id> = self
            .entries
            .iter()
            .map(|e| e.winner.clone())
            .collect::<Option<_>>()?;
        if winners.len() == 1 {
            return winners.into_iter().next().map(Progress::Champion);
        }
        Some(Progress::Next(Self::paired(self.round + 1, winners)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u32) -> Vec<u32> {
        (1..=n).collect()
    }

    #[test]
    fn too_few_entrants() {
        let mut rng = Mulberry32::new(1);
        assert!(Bracket::seeded(vec![1u32], &mut rng).is_none());
    }

    #[test]
    fn odd_entrant_gets_a_bye() {
        let mut rng = Mulberry32::new(1);
        let b = Bracket::seeded(ids(5), &mut rng).unwrap();
        assert_eq!(b.entries.len(), 3);
        let bye = &b.entries[2];
        assert!(bye.is_bye());
        assert_eq!(bye.winner, Some(bye.left));
        assert_eq!(b.next_pending(), Some(0));
    }

    #[test]
    fn same_seed_same_bracket() {
        let a = Bracket::seeded(ids(8), &mut Mulberry32::new(4)).unwrap();
        let b = Bracket::seeded(ids(8), &mut Mulberry32::new(4)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn runs_to_a_champion() {
        let mut rng = Mulberry32::new(9);
        let mut bracket = Bracket::seeded(ids(5), &mut rng).unwrap();
        let champion = loop {
            while let Some(i) = bracket.next_pending() {
                let left = bracket.entries[i].left;
                bracket.record_winner(i, left).unwrap();
            }
            match bracket.advance().unwrap() {
                Progress::Next(next) => {
                    assert_eq!(next.round, bracket.round + 1);
                    bracket = next;
                }
                Progress::Champion(id) => break id,
            }
        };
        assert!(ids(5).contains(&champion));
        assert_eq!(bracket.round, 3);
    }

    #[test]
    fn record_winner_rejects_bad_input() {
        let mut rng = Mulberry32::new(2);
        let mut b = Bracket::seeded(ids(3), &mut rng).unwrap();
        assert_eq!(b.record_winner(7, 1), Err(BracketError::NoSuchEntry(7)));
        assert_eq!(b.record_winner(1, 1), Err(BracketError::AlreadyDecided(1)));
        let stranger = 99;
        assert_eq!(
            b.record_winner(0, stranger),
            Err(BracketError::NotAContestant(0))
        );
        assert!(b.advance().is_none());
    }

    #[test]
    fn withdraw_awards_opponent() {
        let mut rng = Mulberry32::new(2);
        let mut b = Bracket::seeded(ids(4), &mut rng).unwrap();
        let left = b.entries[1].left;
        let right = b.entries[1].right.unwrap();
        assert_eq!(b.withdraw(&left), Some(1));
        assert_eq!(b.entries[1].winner, Some(right));
        assert_eq!(b.withdraw(&left), None);
    }
}
