use serde::Serialize;
use thiserror::Error;

use crate::rng::Rng;

pub type RankId = u8;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Rank {
    pub id: RankId,
    pub name: &'static str,
    pub radius: f32,
    pub color: u32,
    pub score: u32,
}

const fn rank(id: RankId, name: &'static str, radius: f32, color: u32, score: u32) -> Rank {
    Rank {
        id,
        name,
        radius,
        color,
        score,
    }
}

pub const RANKS: [Rank; 14] = [
    rank(0, "二等陸士", 18.0, 0xff6b6b, 1),
    rank(1, "一等陸士", 24.0, 0xff8c42, 2),
    rank(2, "陸士長", 30.0, 0xffa726, 3),
    rank(3, "三等陸曹", 36.0, 0xffca28, 5),
    rank(4, "二等陸曹", 42.0, 0xd4e157, 8),
    rank(5, "一等陸曹", 48.0, 0x9ccc65, 13),
    rank(6, "曹長", 54.0, 0x66bb6a, 21),
    rank(7, "准尉", 60.0, 0x26a69a, 34),
    rank(8, "三等陸尉", 66.0, 0x29b6f6, 55),
    rank(9, "二等陸尉", 72.0, 0x42a5f5, 89),
    rank(10, "一等陸尉", 78.0, 0x5c6bc0, 144),
    rank(11, "三等陸佐", 84.0, 0x7e57c2, 233),
    rank(12, "陸将補", 90.0, 0xab47bc, 377),
    rank(13, "陸将", 96.0, 0xec407a, 610),
];

pub const MAX_RANK_ID: RankId = (RANKS.len() - 1) as RankId;

pub fn lookup(id: RankId) -> Option<&'static Rank> {
    RANKS.get(id as usize)
}

pub fn is_max_rank(id: RankId) -> bool {
    id >= MAX_RANK_ID
}

pub fn random_spawn_rank(rng: &mut Rng, pool: usize) -> RankId {
    let pool = pool.clamp(1, RANKS.len());
    rng.pick_index(pool) as RankId
}

#[derive(Debug, Error, PartialEq)]
pub enum RankTableError {
    #[error("rank at index {index} has id {id}")]
    NonContiguousId { index: usize, id: RankId },
    #[error("rank {id} radius does not exceed the previous rank")]
    RadiusNotIncreasing { id: RankId },
    #[error("rank {id} score does not exceed the previous rank")]
    ScoreNotIncreasing { id: RankId },
    #[error("rank {id} radius must be positive")]
    NonPositiveRadius { id: RankId },
}

pub fn validate_table(table: &[Rank]) -> Result<(), RankTableError> {
    for (index, current) in table.iter().enumerate() {
        if current.id as usize != index {
            return Err(RankTableError::NonContiguousId {
                index,
                id: current.id,
            });
        }
        if current.radius <= 0.0 {
            return Err(RankTableError::NonPositiveRadius { id: current.id });
        }
        let Some(previous) = index.checked_sub(1).map(|prev| &table[prev]) else {
            continue;
        };
        if current.radius <= previous.radius {
            return Err(RankTableError::RadiusNotIncreasing { id: current.id });
        }
        if current.score <= previous.score {
            return Err(RankTableError::ScoreNotIncreasing { id: current.id });
        }
    }
    Ok(())
}
