use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::id::RoomId;

pub mod event;

/// Real-world occupancy of the physical room, distinct from any
/// reservation's own lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum RoomStatus {
    Available,
    Occupied,
    Maintenance,
}

#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub hourly_rate: f64,
    pub status: RoomStatus,
}

impl Room {
    pub fn set_occupied(&mut self) {
        self.status = RoomStatus::Occupied;
    }

    pub fn set_available(&mut self) {
        self.status = RoomStatus::Available;
    }

    pub fn is_physically_available(&self) -> bool {
        matches!(self.status, RoomStatus::Available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupancy_flips_through_mutators() {
        let mut room = Room {
            id: RoomId::new(),
            name: "PS Room 1".into(),
            hourly_rate: 80.0,
            status: RoomStatus::Available,
        };
        assert!(room.is_physically_available());

        room.set_occupied();
        assert_eq!(room.status, RoomStatus::Occupied);
        assert!(!room.is_physically_available());

        room.set_available();
        assert!(room.is_physically_available());
    }

    #[test]
    fn maintenance_is_not_available() {
        let room = Room {
            id: RoomId::new(),
            name: "PS Room 2".into(),
            hourly_rate: 80.0,
            status: RoomStatus::Maintenance,
        };
        assert!(!room.is_physically_available());
    }
}
