use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult};
use strum::{Display, EnumString};

use crate::model::id::{CustomerId, ReservationId, RoomId};

pub mod access_code;
pub mod event;

use access_code::AccessCode;
use event::{ReservationSnapshot, SessionEvent};

/// A `Reserved` reservation not started within this window is a no-show.
pub const RESERVATION_EXPIRATION_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum ReservationStatus {
    Reserved,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum MemberRole {
    Owner,
    Member,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum PlayerMode {
    Single,
    Multiplayer,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMember {
    pub reservation_id: ReservationId,
    pub customer_id: CustomerId,
    pub customer_name: Option<String>,
    pub joined_at: DateTime<Utc>,
    pub role: MemberRole,
}

/// Billing sub-interval. A session always has one open segment while active;
/// changing the player mode closes the current segment and opens the next at
/// its own rate, and ending the session closes the last one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSegment {
    pub reservation_id: ReservationId,
    pub player_mode: PlayerMode,
    pub hourly_rate: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl SessionSegment {
    fn end(&mut self, now: DateTime<Utc>) {
        self.end_time = Some(now);
    }

    /// Elapsed time rounded to the nearest quarter hour, ties away from zero.
    /// Only meaningful once the segment is closed.
    pub fn rounded_hours(&self) -> f64 {
        match self.end_time {
            Some(end) => quarter_hours(self.start_time, end),
            None => 0.0,
        }
    }

    pub fn cost(&self) -> f64 {
        self.rounded_hours() * self.hourly_rate
    }
}

fn quarter_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let minutes = (end - start).num_seconds() as f64 / 60.0;
    // f64::round is ties-away-from-zero, which is the billing convention.
    (minutes / 15.0).round() * 0.25
}

/// The aggregate root for one customer engagement with one room. All status,
/// roster and billing mutations go through the methods below; the
/// orchestration layer never touches fields directly and mirrors the Room's
/// physical status in the same unit of work.
///
/// Transitions are pure and synchronous: they either fully apply (invariants
/// hold, exactly one event queued) or fail without mutating anything.
#[derive(Debug)]
pub struct Reservation {
    id: ReservationId,
    room_id: RoomId,
    customer_id: Option<CustomerId>,
    customer_name: Option<String>,
    access_code: Option<AccessCode>,
    access_code_generated_at: Option<DateTime<Utc>>,
    members: Vec<SessionMember>,
    segments: Vec<SessionSegment>,
    created_at: DateTime<Utc>,
    actual_start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    // Rate snapshot taken at creation; later room price changes do not
    // affect an in-flight session.
    hourly_rate: f64,
    player_mode: PlayerMode,
    total_cost: Option<f64>,
    status: ReservationStatus,
    notes: Option<String>,
    events: Vec<SessionEvent>,
}

/// Raw persisted form of a reservation. The persistence adapter rehydrates
/// the aggregate through this without replaying lifecycle transitions.
pub struct ReservationRecord {
    pub id: ReservationId,
    pub room_id: RoomId,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
    pub access_code: Option<AccessCode>,
    pub access_code_generated_at: Option<DateTime<Utc>>,
    pub members: Vec<SessionMember>,
    pub segments: Vec<SessionSegment>,
    pub created_at: DateTime<Utc>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub hourly_rate: f64,
    pub player_mode: PlayerMode,
    pub total_cost: Option<f64>,
    pub status: ReservationStatus,
    pub notes: Option<String>,
}

impl From<ReservationRecord> for Reservation {
    fn from(value: ReservationRecord) -> Self {
        let ReservationRecord {
            id,
            room_id,
            customer_id,
            customer_name,
            access_code,
            access_code_generated_at,
            members,
            segments,
            created_at,
            actual_start_time,
            end_time,
            hourly_rate,
            player_mode,
            total_cost,
            status,
            notes,
        } = value;
        Self {
            id,
            room_id,
            customer_id,
            customer_name,
            access_code,
            access_code_generated_at,
            members,
            segments,
            created_at,
            actual_start_time,
            end_time,
            hourly_rate,
            player_mode,
            total_cost,
            status,
            notes,
            events: Vec::new(),
        }
    }
}

impl Reservation {
    /// Scheduled booking: the room is claimed but not yet occupied.
    pub fn reserve(
        room_id: RoomId,
        customer_id: CustomerId,
        customer_name: Option<String>,
        hourly_rate: f64,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        require_customer(&customer_id)?;
        require_rate(hourly_rate)?;

        let mut reservation = Self::blank(
            room_id,
            Some(customer_id),
            customer_name,
            hourly_rate,
            PlayerMode::Single,
            notes,
            now,
            ReservationStatus::Reserved,
        );
        reservation.raise(|snapshot| SessionEvent::RoomReserved {
            reservation: snapshot,
        });
        Ok(reservation)
    }

    /// Walk-in with a known owner: the session is active immediately.
    pub fn walk_in(
        room_id: RoomId,
        customer_id: CustomerId,
        customer_name: Option<String>,
        hourly_rate: f64,
        player_mode: PlayerMode,
        notes: Option<String>,
        code: AccessCode,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        require_customer(&customer_id)?;
        require_rate(hourly_rate)?;

        let mut reservation = Self::blank(
            room_id,
            Some(customer_id),
            customer_name,
            hourly_rate,
            player_mode,
            notes,
            now,
            ReservationStatus::Active,
        );
        reservation.begin(code, now);
        reservation.raise(|snapshot| SessionEvent::SessionStarted {
            reservation: snapshot,
        });
        Ok(reservation)
    }

    /// Walk-in with no assigned owner yet; the first joiner becomes owner.
    pub fn walk_in_without_owner(
        room_id: RoomId,
        hourly_rate: f64,
        player_mode: PlayerMode,
        notes: Option<String>,
        code: AccessCode,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        require_rate(hourly_rate)?;

        let mut reservation = Self::blank(
            room_id,
            None,
            None,
            hourly_rate,
            player_mode,
            notes,
            now,
            ReservationStatus::Active,
        );
        reservation.begin(code, now);
        reservation.raise(|snapshot| SessionEvent::SessionStarted {
            reservation: snapshot,
        });
        Ok(reservation)
    }

    #[allow(clippy::too_many_arguments)]
    fn blank(
        room_id: RoomId,
        customer_id: Option<CustomerId>,
        customer_name: Option<String>,
        hourly_rate: f64,
        player_mode: PlayerMode,
        notes: Option<String>,
        now: DateTime<Utc>,
        status: ReservationStatus,
    ) -> Self {
        Self {
            id: ReservationId::new(),
            room_id,
            customer_id,
            customer_name,
            access_code: None,
            access_code_generated_at: None,
            members: Vec::new(),
            segments: Vec::new(),
            created_at: now,
            actual_start_time: None,
            end_time: None,
            hourly_rate,
            player_mode,
            total_cost: None,
            status,
            notes,
            events: Vec::new(),
        }
    }

    /// Turns a `Reserved` booking into a running session.
    pub fn start_session(&mut self, code: AccessCode, now: DateTime<Utc>) -> AppResult<()> {
        if self.status != ReservationStatus::Reserved {
            return Err(self.transition_error("start the session"));
        }
        self.status = ReservationStatus::Active;
        self.begin(code, now);
        self.raise(|snapshot| SessionEvent::SessionStarted {
            reservation: snapshot,
        });
        Ok(())
    }

    /// Shared session-start bookkeeping: the billable clock, the join code
    /// and the initial billing segment. Seats the owner if one is known.
    fn begin(&mut self, code: AccessCode, now: DateTime<Utc>) {
        self.actual_start_time = Some(now);
        self.access_code = Some(code);
        self.access_code_generated_at = Some(now);
        self.segments.push(SessionSegment {
            reservation_id: self.id,
            player_mode: self.player_mode,
            hourly_rate: self.hourly_rate,
            start_time: now,
            end_time: None,
        });
        if let Some(customer_id) = self.customer_id.clone() {
            if !self.members.iter().any(|m| m.customer_id == customer_id) {
                self.members.push(SessionMember {
                    reservation_id: self.id,
                    customer_id,
                    customer_name: self.customer_name.clone(),
                    joined_at: now,
                    role: MemberRole::Owner,
                });
            }
        }
    }

    /// Completes an active session, fixing `end_time` and the billed total.
    pub fn end_session(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        if self.status != ReservationStatus::Active {
            return Err(self.transition_error("end the session"));
        }
        if self.actual_start_time.is_none() {
            return Err(AppError::InvalidTransition(format!(
                "cannot end the session: reservation {} was never started",
                self.id
            )));
        }
        if let Some(open) = self.segments.iter_mut().find(|s| s.end_time.is_none()) {
            open.end(now);
        }
        self.end_time = Some(now);
        self.total_cost = Some(self.segments.iter().map(SessionSegment::cost).sum());
        self.status = ReservationStatus::Completed;
        self.raise(|snapshot| SessionEvent::SessionEnded {
            reservation: snapshot,
        });
        Ok(())
    }

    /// Cancels from `Reserved` or `Active`; terminal states are rejected.
    pub fn cancel(&mut self) -> AppResult<()> {
        if matches!(
            self.status,
            ReservationStatus::Completed | ReservationStatus::Cancelled
        ) {
            return Err(self.transition_error("cancel the reservation"));
        }
        let previous_status = self.status;
        self.status = ReservationStatus::Cancelled;
        self.raise(|snapshot| SessionEvent::ReservationCancelled {
            reservation: snapshot,
            previous_status,
        });
        Ok(())
    }

    /// No-show path: a `Reserved` booking past its expiration window.
    pub fn cancel_due_to_expiration(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        if self.status != ReservationStatus::Reserved {
            return Err(self.transition_error("expire the reservation"));
        }
        self.status = ReservationStatus::Cancelled;
        self.end_time = Some(now);
        self.raise(|snapshot| SessionEvent::ReservationCancelled {
            reservation: snapshot,
            previous_status: ReservationStatus::Reserved,
        });
        Ok(())
    }

    /// Attaches a customer to the running session. The first joiner of an
    /// ownerless walk-in becomes the owner and the reservation's primary
    /// customer in one step; everyone after that joins as a plain member.
    pub fn add_member(
        &mut self,
        customer_id: CustomerId,
        customer_name: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if self.status != ReservationStatus::Active {
            return Err(self.transition_error("join the session"));
        }
        require_customer(&customer_id)?;
        if self.has_member(&customer_id) {
            return Err(AppError::MembershipConflict(format!(
                "customer {customer_id} already belongs to reservation {}",
                self.id
            )));
        }
        if self.customer_id.is_none() && self.members.is_empty() {
            self.bind_owner(customer_id, customer_name, now);
        } else {
            self.members.push(SessionMember {
                reservation_id: self.id,
                customer_id,
                customer_name,
                joined_at: now,
                role: MemberRole::Member,
            });
        }
        Ok(())
    }

    pub fn remove_member(&mut self, customer_id: &CustomerId) -> AppResult<()> {
        let Some(position) = self
            .members
            .iter()
            .position(|m| &m.customer_id == customer_id)
        else {
            return Err(AppError::MembershipConflict(format!(
                "customer {customer_id} is not a member of reservation {}",
                self.id
            )));
        };
        if self.members[position].role == MemberRole::Owner
            || self.customer_id.as_ref() == Some(customer_id)
        {
            return Err(AppError::MembershipConflict(format!(
                "cannot remove the owner of reservation {}",
                self.id
            )));
        }
        self.members.remove(position);
        Ok(())
    }

    /// Binds an owner to a previously unowned walk-in session.
    pub fn assign_customer(
        &mut self,
        customer_id: CustomerId,
        customer_name: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if self.status != ReservationStatus::Active {
            return Err(self.transition_error("assign a customer"));
        }
        require_customer(&customer_id)?;
        if self.customer_id.is_some() || self.owner().is_some() {
            return Err(AppError::MembershipConflict(format!(
                "reservation {} already has an owner",
                self.id
            )));
        }
        if self.has_member(&customer_id) {
            return Err(AppError::MembershipConflict(format!(
                "customer {customer_id} already belongs to reservation {}",
                self.id
            )));
        }
        self.bind_owner(customer_id, customer_name, now);
        Ok(())
    }

    /// Single code path that keeps the primary customer and the owner row in
    /// the roster in sync.
    fn bind_owner(
        &mut self,
        customer_id: CustomerId,
        customer_name: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.customer_id = Some(customer_id.clone());
        self.customer_name = customer_name.clone();
        self.members.push(SessionMember {
            reservation_id: self.id,
            customer_id,
            customer_name,
            joined_at: now,
            role: MemberRole::Owner,
        });
    }

    /// Switches the billing mode mid-session: closes the open segment and
    /// opens the next one at the given rate.
    pub fn change_player_mode(
        &mut self,
        player_mode: PlayerMode,
        hourly_rate: f64,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if self.status != ReservationStatus::Active {
            return Err(self.transition_error("change the player mode"));
        }
        require_rate(hourly_rate)?;
        if let Some(open) = self.segments.iter().find(|s| s.end_time.is_none()) {
            if open.player_mode == player_mode && open.hourly_rate == hourly_rate {
                return Err(AppError::UnprocessableEntity(format!(
                    "session is already in {player_mode} mode at that rate"
                )));
            }
        }
        if let Some(open) = self.segments.iter_mut().find(|s| s.end_time.is_none()) {
            open.end(now);
        }
        self.player_mode = player_mode;
        self.segments.push(SessionSegment {
            reservation_id: self.id,
            player_mode,
            hourly_rate,
            start_time: now,
            end_time: None,
        });
        Ok(())
    }

    pub fn has_member(&self, customer_id: &CustomerId) -> bool {
        self.customer_id.as_ref() == Some(customer_id)
            || self.members.iter().any(|m| &m.customer_id == customer_id)
    }

    pub fn member_role(&self, customer_id: &CustomerId) -> Option<MemberRole> {
        if let Some(member) = self.members.iter().find(|m| &m.customer_id == customer_id) {
            return Some(member.role);
        }
        // The primary customer always counts as the owner, even if the
        // persisted roster predates them being seated.
        (self.customer_id.as_ref() == Some(customer_id)).then_some(MemberRole::Owner)
    }

    pub fn owner(&self) -> Option<&SessionMember> {
        self.members.iter().find(|m| m.role == MemberRole::Owner)
    }

    /// Billable hours over all closed segments, quarter-rounded per segment.
    pub fn rounded_hours(&self) -> f64 {
        self.segments.iter().map(SessionSegment::rounded_hours).sum()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Reserved && now >= self.expiration_deadline()
    }

    /// Time left before the no-show cutoff; zero once expired or for any
    /// reservation that is no longer `Reserved`.
    pub fn time_until_expiration(&self, now: DateTime<Utc>) -> Duration {
        if self.status != ReservationStatus::Reserved {
            return Duration::zero();
        }
        (self.expiration_deadline() - now).max(Duration::zero())
    }

    fn expiration_deadline(&self) -> DateTime<Utc> {
        self.created_at + Duration::minutes(RESERVATION_EXPIRATION_MINUTES)
    }

    /// Drains the events queued by transitions since the last call. Invoked
    /// by orchestration after the unit of work commits.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> ReservationSnapshot {
        ReservationSnapshot {
            id: self.id,
            room_id: self.room_id,
            customer_id: self.customer_id.clone(),
            customer_name: self.customer_name.clone(),
            access_code: self.access_code.as_ref().map(|c| c.as_str().to_string()),
            created_at: self.created_at,
            actual_start_time: self.actual_start_time,
            end_time: self.end_time,
            hourly_rate: self.hourly_rate,
            player_mode: self.player_mode,
            total_cost: self.total_cost,
            status: self.status,
            notes: self.notes.clone(),
            members: self.members.clone(),
        }
    }

    fn raise(&mut self, build: impl FnOnce(ReservationSnapshot) -> SessionEvent) {
        let snapshot = self.snapshot();
        self.events.push(build(snapshot));
    }

    fn transition_error(&self, operation: &str) -> AppError {
        AppError::InvalidTransition(format!(
            "cannot {operation}: reservation {} is {}",
            self.id, self.status
        ))
    }

    pub fn id(&self) -> ReservationId {
        self.id
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn customer_id(&self) -> Option<&CustomerId> {
        self.customer_id.as_ref()
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.customer_name.as_deref()
    }

    pub fn access_code(&self) -> Option<&AccessCode> {
        self.access_code.as_ref()
    }

    pub fn access_code_generated_at(&self) -> Option<DateTime<Utc>> {
        self.access_code_generated_at
    }

    pub fn members(&self) -> &[SessionMember] {
        &self.members
    }

    pub fn segments(&self) -> &[SessionSegment] {
        &self.segments
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn actual_start_time(&self) -> Option<DateTime<Utc>> {
        self.actual_start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn hourly_rate(&self) -> f64 {
        self.hourly_rate
    }

    pub fn player_mode(&self) -> PlayerMode {
        self.player_mode
    }

    pub fn total_cost(&self) -> Option<f64> {
        self.total_cost
    }

    pub fn status(&self) -> ReservationStatus {
        self.status
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

fn require_customer(customer_id: &CustomerId) -> AppResult<()> {
    if customer_id.is_blank() {
        return Err(AppError::UnprocessableEntity(
            "customer id must not be empty".into(),
        ));
    }
    Ok(())
}

fn require_rate(hourly_rate: f64) -> AppResult<()> {
    if hourly_rate <= 0.0 {
        return Err(AppError::UnprocessableEntity(format!(
            "hourly rate must be positive, got {hourly_rate}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::access_code::tests::FixedDigits;
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn minutes(m: i64) -> Duration {
        Duration::minutes(m)
    }

    fn code(a: u8, b: u8) -> AccessCode {
        AccessCode::generate(&mut FixedDigits(vec![a, b]))
    }

    fn customer(id: &str) -> CustomerId {
        CustomerId::new(id)
    }

    fn scheduled() -> Reservation {
        Reservation::reserve(
            RoomId::new(),
            customer("cust-1"),
            Some("Mika".into()),
            100.0,
            None,
            t0(),
        )
        .unwrap()
    }

    fn active_walk_in() -> Reservation {
        Reservation::walk_in_without_owner(
            RoomId::new(),
            80.0,
            PlayerMode::Single,
            None,
            code(4, 2),
            t0(),
        )
        .unwrap()
    }

    #[test]
    fn reserve_queues_room_reserved() {
        let mut r = scheduled();
        assert_eq!(r.status(), ReservationStatus::Reserved);
        assert!(r.actual_start_time().is_none());
        let events = r.take_events();
        assert!(matches!(events.as_slice(), [SessionEvent::RoomReserved { .. }]));
        assert!(r.take_events().is_empty());
    }

    #[test]
    fn reserve_rejects_blank_customer_and_bad_rate() {
        let err = Reservation::reserve(RoomId::new(), customer("  "), None, 100.0, None, t0())
            .unwrap_err();
        assert!(matches!(err, AppError::UnprocessableEntity(_)));

        let err = Reservation::reserve(RoomId::new(), customer("c"), None, 0.0, None, t0())
            .unwrap_err();
        assert!(matches!(err, AppError::UnprocessableEntity(_)));
    }

    #[test]
    fn start_session_activates_and_seats_the_owner() {
        let mut r = scheduled();
        r.take_events();
        r.start_session(code(1, 3), t0() + minutes(5)).unwrap();

        assert_eq!(r.status(), ReservationStatus::Active);
        assert_eq!(r.access_code().unwrap().as_str(), "1133");
        assert_eq!(r.actual_start_time(), Some(t0() + minutes(5)));
        assert_eq!(r.segments().len(), 1);
        assert_eq!(
            r.member_role(&customer("cust-1")),
            Some(MemberRole::Owner)
        );
        let events = r.take_events();
        assert!(matches!(events.as_slice(), [SessionEvent::SessionStarted { .. }]));
    }

    #[test]
    fn start_session_requires_reserved() {
        let mut r = active_walk_in();
        let err = r.start_session(code(1, 1), t0()).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert!(err.to_string().contains("Active"));

        let mut r = scheduled();
        r.cancel().unwrap();
        assert!(r.start_session(code(1, 1), t0()).is_err());
    }

    #[test]
    fn end_session_bills_quarter_hours_away_from_zero() {
        // 40 minutes at 100/h -> 3 quarters -> 0.75h -> 75.00
        let mut r = scheduled();
        r.start_session(code(1, 1), t0()).unwrap();
        r.end_session(t0() + minutes(40)).unwrap();

        assert_eq!(r.status(), ReservationStatus::Completed);
        assert_eq!(r.rounded_hours(), 0.75);
        assert_eq!(r.total_cost(), Some(75.0));
        assert_eq!(r.end_time(), Some(t0() + minutes(40)));
    }

    #[test]
    fn short_sessions_round_down_to_zero() {
        // 7 minutes -> 0 quarters -> 0.00
        let mut r = Reservation::walk_in(
            RoomId::new(),
            customer("c"),
            None,
            40.0,
            PlayerMode::Single,
            None,
            code(9, 9),
            t0(),
        )
        .unwrap();
        r.end_session(t0() + minutes(7)).unwrap();
        assert_eq!(r.rounded_hours(), 0.0);
        assert_eq!(r.total_cost(), Some(0.0));
    }

    #[test]
    fn boundary_durations_resolve_deterministically() {
        // 22.5 minutes sits exactly between 1 and 2 quarters; away-from-zero
        // rounding bills 2 quarters.
        let mut r = scheduled();
        r.start_session(code(1, 1), t0()).unwrap();
        r.end_session(t0() + Duration::seconds(22 * 60 + 30)).unwrap();
        assert_eq!(r.rounded_hours(), 0.5);
        assert_eq!(r.total_cost(), Some(50.0));
    }

    #[test]
    fn end_session_rejected_outside_active_without_mutation() {
        let mut r = scheduled();
        let err = r.end_session(t0() + minutes(30)).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert!(r.end_time().is_none());
        assert!(r.total_cost().is_none());
        assert_eq!(r.status(), ReservationStatus::Reserved);

        let mut r = active_walk_in();
        r.end_session(t0() + minutes(30)).unwrap();
        assert!(r.end_session(t0() + minutes(31)).is_err());
    }

    #[test]
    fn cancel_records_previous_status() {
        let mut r = active_walk_in();
        r.take_events();
        r.cancel().unwrap();
        let events = r.take_events();
        match events.as_slice() {
            [SessionEvent::ReservationCancelled {
                previous_status, ..
            }] => assert_eq!(*previous_status, ReservationStatus::Active),
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn cancel_is_rejected_in_terminal_states() {
        let mut r = active_walk_in();
        r.cancel().unwrap();
        assert!(matches!(
            r.cancel().unwrap_err(),
            AppError::InvalidTransition(_)
        ));

        let mut r = active_walk_in();
        r.end_session(t0() + minutes(20)).unwrap();
        assert!(r.cancel().is_err());
        assert_eq!(r.status(), ReservationStatus::Completed);
    }

    #[test]
    fn expiration_cancels_reserved_and_raises_an_event() {
        let mut r = scheduled();
        r.take_events();
        r.cancel_due_to_expiration(t0() + minutes(20)).unwrap();
        assert_eq!(r.status(), ReservationStatus::Cancelled);
        assert_eq!(r.end_time(), Some(t0() + minutes(20)));
        let events = r.take_events();
        match events.as_slice() {
            [SessionEvent::ReservationCancelled {
                previous_status, ..
            }] => assert_eq!(*previous_status, ReservationStatus::Reserved),
            other => panic!("unexpected events: {other:?}"),
        }

        let mut r = active_walk_in();
        assert!(r.cancel_due_to_expiration(t0()).is_err());
    }

    #[test]
    fn expiration_window_is_fifteen_minutes() {
        let r = scheduled();
        assert!(!r.is_expired(t0() + minutes(14)));
        assert!(r.is_expired(t0() + minutes(15)));
        assert!(r.is_expired(t0() + minutes(20)));
        assert_eq!(
            r.time_until_expiration(t0() + minutes(10)),
            Duration::minutes(5)
        );
        assert_eq!(
            r.time_until_expiration(t0() + minutes(20)),
            Duration::zero()
        );

        let active = active_walk_in();
        assert!(!active.is_expired(t0() + minutes(60)));
    }

    #[test]
    fn first_joiner_of_ownerless_walk_in_becomes_owner() {
        let mut r = active_walk_in();
        assert!(r.customer_id().is_none());

        r.add_member(customer("A"), Some("Aki".into()), t0() + minutes(1))
            .unwrap();
        assert_eq!(r.member_role(&customer("A")), Some(MemberRole::Owner));
        assert_eq!(r.customer_id(), Some(&customer("A")));
        assert_eq!(r.customer_name(), Some("Aki"));

        r.add_member(customer("B"), None, t0() + minutes(2)).unwrap();
        assert_eq!(r.member_role(&customer("B")), Some(MemberRole::Member));
        assert_eq!(r.members().len(), 2);
    }

    #[test]
    fn duplicate_join_fails_and_leaves_roster_unchanged() {
        let mut r = active_walk_in();
        r.add_member(customer("A"), None, t0()).unwrap();
        let err = r.add_member(customer("A"), None, t0() + minutes(1)).unwrap_err();
        assert!(matches!(err, AppError::MembershipConflict(_)));
        assert_eq!(r.members().len(), 1);
    }

    #[test]
    fn join_requires_an_active_session() {
        let mut r = scheduled();
        let err = r.add_member(customer("A"), None, t0()).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn owner_cannot_be_removed_and_non_members_are_rejected() {
        let mut r = active_walk_in();
        r.add_member(customer("A"), None, t0()).unwrap();
        r.add_member(customer("B"), None, t0()).unwrap();

        assert!(matches!(
            r.remove_member(&customer("A")).unwrap_err(),
            AppError::MembershipConflict(_)
        ));
        assert!(matches!(
            r.remove_member(&customer("ghost")).unwrap_err(),
            AppError::MembershipConflict(_)
        ));

        r.remove_member(&customer("B")).unwrap();
        assert!(!r.has_member(&customer("B")));
    }

    #[test]
    fn assign_customer_binds_an_owner_once() {
        let mut r = active_walk_in();
        r.assign_customer(customer("A"), Some("Aki".into()), t0()).unwrap();
        assert_eq!(r.member_role(&customer("A")), Some(MemberRole::Owner));

        let err = r.assign_customer(customer("B"), None, t0()).unwrap_err();
        assert!(matches!(err, AppError::MembershipConflict(_)));
    }

    #[test]
    fn primary_customer_counts_as_owner_even_without_a_roster_row() {
        // Rehydrated legacy rows may carry a primary customer with no member
        // row; membership queries still treat them as the owner.
        let r: Reservation = ReservationRecord {
            id: ReservationId::new(),
            room_id: RoomId::new(),
            customer_id: Some(customer("legacy")),
            customer_name: None,
            access_code: None,
            access_code_generated_at: None,
            members: Vec::new(),
            segments: Vec::new(),
            created_at: t0(),
            actual_start_time: Some(t0()),
            end_time: None,
            hourly_rate: 80.0,
            player_mode: PlayerMode::Single,
            total_cost: None,
            status: ReservationStatus::Active,
            notes: None,
        }
        .into();
        assert!(r.has_member(&customer("legacy")));
        assert_eq!(r.member_role(&customer("legacy")), Some(MemberRole::Owner));
    }

    #[test]
    fn changing_player_mode_splits_billing_segments() {
        let mut r = active_walk_in();
        r.change_player_mode(PlayerMode::Multiplayer, 120.0, t0() + minutes(30))
            .unwrap();
        assert_eq!(r.segments().len(), 2);
        assert_eq!(r.player_mode(), PlayerMode::Multiplayer);

        // 30 min @ 80/h = 0.5h * 80 = 40; 30 min @ 120/h = 0.5h * 120 = 60
        r.end_session(t0() + minutes(60)).unwrap();
        assert_eq!(r.rounded_hours(), 1.0);
        assert_eq!(r.total_cost(), Some(100.0));
    }

    #[test]
    fn changing_to_the_same_mode_and_rate_is_rejected() {
        let mut r = active_walk_in();
        let err = r
            .change_player_mode(PlayerMode::Single, 80.0, t0() + minutes(5))
            .unwrap_err();
        assert!(matches!(err, AppError::UnprocessableEntity(_)));
        assert_eq!(r.segments().len(), 1);
    }

    #[test]
    fn walk_in_end_to_end_scenario() {
        // Ownerless walk-in at 80/h, A joins then B, 50
        // minutes later the session ends at 0.75h = 60.00.
        let mut r = active_walk_in();
        r.add_member(customer("A"), None, t0() + minutes(1)).unwrap();
        assert_eq!(r.member_role(&customer("A")), Some(MemberRole::Owner));
        r.add_member(customer("B"), None, t0() + minutes(2)).unwrap();
        assert_eq!(r.member_role(&customer("B")), Some(MemberRole::Member));

        r.end_session(t0() + minutes(50)).unwrap();
        assert_eq!(r.rounded_hours(), 0.75);
        assert_eq!(r.total_cost(), Some(60.0));
    }
}
