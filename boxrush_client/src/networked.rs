//! Networked session.
//!
//! The server owns room membership, the peer's state and enemy spawns; the
//! self cube's motion and crash detection still run here every frame.
//!
//! Flow: `Connecting` until the server assigns an identity, then `Joining`
//! after asking to join (or create) a room, then `Joined` once the room is
//! confirmed and the self cube exists. There is no way back: a dead channel
//! leaves the manager wherever it was.

use boxrush_shared::{
    entity::{ground_box, PhysicsBox, COMPANION_COLOR},
    event::{CubeKind, CubeListener},
    math::Vec3,
    net::{BoxSnapshot, ClientId, RoomId, SyncMsg},
};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::manager::{ManagerError, ObjectManager, Roster};

/// Outbound half of the sync channel as the manager sees it.
pub type Outbox = mpsc::UnboundedSender<SyncMsg>;

/// Connection progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Waiting for the server to assign an identity.
    Connecting,
    /// Join or create request sent; waiting for confirmation.
    Joining,
    /// In a room with a self cube.
    Joined,
}

/// Object manager driven by the sync channel.
#[derive(Debug)]
pub struct NetworkObjectManager {
    roster: Roster,
    state: SyncState,
    client_id: Option<ClientId>,
    /// Room requested at construction; `None` asks for a new one.
    requested_room: Option<RoomId>,
    room_id: Option<RoomId>,
    outbox: Outbox,
}

impl NetworkObjectManager {
    pub fn new(requested_room: Option<RoomId>, outbox: Outbox) -> Self {
        Self::with_ground(ground_box(), requested_room, outbox)
    }

    pub fn with_ground(ground: PhysicsBox, requested_room: Option<RoomId>, outbox: Outbox) -> Self {
        Self {
            roster: Roster::new(ground),
            state: SyncState::Connecting,
            client_id: None,
            requested_room,
            room_id: None,
            outbox,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    /// The confirmed room, for sharing with a second player.
    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    fn send(&self, msg: SyncMsg) -> Result<(), ManagerError> {
        self.outbox
            .send(msg)
            .map_err(|_| ManagerError::ChannelClosed)
    }

    fn is_self_echo(&self, id: ClientId) -> bool {
        self.client_id == Some(id)
    }

    /// Applies one inbound message.
    ///
    /// Unexpected or misdirected messages are ignored. The only error is a
    /// closed outbox while answering the identity assignment.
    pub fn handle_message(&mut self, msg: SyncMsg) -> Result<(), ManagerError> {
        match msg {
            SyncMsg::IdentityAssigned { id } => self.on_identity(id),
            SyncMsg::RoomConfirmed { room_id, cube } => {
                self.on_room_confirmed(room_id, &cube);
                Ok(())
            }
            SyncMsg::EnemySpawned { enemy } => {
                self.roster.push_enemy(PhysicsBox::from_snapshot(&enemy));
                Ok(())
            }
            SyncMsg::PeerJoined { id, cube } => {
                self.on_peer_joined(id, &cube);
                Ok(())
            }
            SyncMsg::PeerPosition { id, velocity, cube } => {
                self.on_peer_position(id, velocity, &cube);
                Ok(())
            }
            other => {
                debug!(?other, "Ignoring message not meant for clients");
                Ok(())
            }
        }
    }

    fn on_identity(&mut self, id: ClientId) -> Result<(), ManagerError> {
        if self.state != SyncState::Connecting {
            debug!(client_id = ?id, state = ?self.state, "Ignoring repeated identity");
            return Ok(());
        }
        self.client_id = Some(id);
        info!(client_id = ?id, "Identity assigned");

        let request = match &self.requested_room {
            Some(room) => SyncMsg::JoinRoom { id: room.clone() },
            None => SyncMsg::CreateRoom,
        };
        self.send(request)?;
        self.state = SyncState::Joining;
        Ok(())
    }

    fn on_room_confirmed(&mut self, room_id: RoomId, cube: &BoxSnapshot) {
        if self.state == SyncState::Joined {
            debug!(room = %room_id, "Ignoring repeated room confirmation");
            return;
        }
        info!(room = %room_id, "Joined room");
        self.roster.set_self_cube(PhysicsBox::from_snapshot(cube));
        self.room_id = Some(room_id);
        self.state = SyncState::Joined;
    }

    fn companion_from(cube: &BoxSnapshot) -> PhysicsBox {
        PhysicsBox::from_snapshot(cube).with_color(COMPANION_COLOR)
    }

    fn on_peer_joined(&mut self, id: ClientId, cube: &BoxSnapshot) {
        if self.is_self_echo(id) {
            return;
        }
        info!(peer = ?id, "Peer joined");
        self.roster.set_companion(Self::companion_from(cube));
        self.roster.advance_companion();
    }

    fn on_peer_position(&mut self, id: ClientId, velocity: Vec3, cube: &BoxSnapshot) {
        if self.is_self_echo(id) {
            return;
        }
        if self.roster.companion().is_none() {
            debug!(peer = ?id, "Peer position before join; creating companion");
            self.roster.set_companion(Self::companion_from(cube));
        }
        if let Some(companion) = self.roster.companion_mut() {
            companion.velocity = velocity;
        }
        self.roster.advance_companion();
    }
}

impl ObjectManager for NetworkObjectManager {
    fn roster(&self) -> &Roster {
        &self.roster
    }

    fn on_cube_created(&mut self, listener: CubeListener) -> bool {
        self.roster.register(listener)
    }

    fn update_cube(&mut self, which: CubeKind, velocity: Vec3) -> Result<bool, ManagerError> {
        if which != CubeKind::SelfCube {
            return Ok(false);
        }

        // Local physics runs every frame, whether or not the report goes out.
        let cube = self.roster.advance_self(velocity)?.snapshot();
        let crashed = self.roster.advance_enemies()?;
        self.send(SyncMsg::SelfPosition { velocity, cube })?;
        Ok(crashed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxrush_shared::entity::player_cube;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<CubeKind>>>;

    fn recorder(log: &Log) -> CubeListener {
        let log = log.clone();
        Arc::new(move |kind: CubeKind, _cube: &PhysicsBox| log.lock().unwrap().push(kind))
    }

    fn manager(room: Option<&str>) -> (NetworkObjectManager, mpsc::UnboundedReceiver<SyncMsg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let room = room.map(|r| RoomId(r.to_string()));
        (NetworkObjectManager::new(room, tx), rx)
    }

    fn joined(me: u32) -> (NetworkObjectManager, mpsc::UnboundedReceiver<SyncMsg>, Log) {
        let (mut m, mut rx) = manager(None);
        let log = Log::default();
        m.on_cube_created(recorder(&log));
        m.handle_message(SyncMsg::IdentityAssigned { id: ClientId(me) })
            .unwrap();
        m.handle_message(SyncMsg::RoomConfirmed {
            room_id: RoomId("r00m42".into()),
            cube: player_cube().snapshot(),
        })
        .unwrap();
        while rx.try_recv().is_ok() {}
        log.lock().unwrap().clear();
        (m, rx, log)
    }

    fn peer_cube() -> BoxSnapshot {
        player_cube()
            .with_position(Vec3::new(2.0, 0.0, 0.0))
            .with_color("#123456")
            .snapshot()
    }

    #[test]
    fn identity_without_room_creates_one() {
        let (mut m, mut rx) = manager(None);
        assert_eq!(m.state(), SyncState::Connecting);

        m.handle_message(SyncMsg::IdentityAssigned { id: ClientId(3) })
            .unwrap();

        assert_eq!(m.state(), SyncState::Joining);
        assert_eq!(m.client_id(), Some(ClientId(3)));
        assert_eq!(rx.try_recv().unwrap(), SyncMsg::CreateRoom);
        assert!(!m.ready());
    }

    #[test]
    fn identity_with_room_joins_it() {
        let (mut m, mut rx) = manager(Some("abc123"));
        m.handle_message(SyncMsg::IdentityAssigned { id: ClientId(3) })
            .unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            SyncMsg::JoinRoom {
                id: RoomId("abc123".into())
            }
        );
    }

    #[test]
    fn identity_with_closed_channel_fails() {
        let (mut m, rx) = manager(None);
        drop(rx);
        assert_eq!(
            m.handle_message(SyncMsg::IdentityAssigned { id: ClientId(1) }),
            Err(ManagerError::ChannelClosed)
        );
        assert_eq!(m.state(), SyncState::Connecting);
    }

    #[test]
    fn room_confirmation_creates_self_cube() {
        let (mut m, _rx) = manager(None);
        let log = Log::default();
        m.on_cube_created(recorder(&log));
        m.handle_message(SyncMsg::IdentityAssigned { id: ClientId(1) })
            .unwrap();

        let snap = player_cube()
            .with_position(Vec3::new(4.0, 0.0, 0.0))
            .snapshot();
        m.handle_message(SyncMsg::RoomConfirmed {
            room_id: RoomId("xyz789".into()),
            cube: snap.clone(),
        })
        .unwrap();

        assert!(m.ready());
        assert_eq!(m.state(), SyncState::Joined);
        assert_eq!(m.room_id(), Some(&RoomId("xyz789".into())));
        assert_eq!(m.roster().self_cube().unwrap().snapshot(), snap);
        assert_eq!(*log.lock().unwrap(), vec![CubeKind::SelfCube]);

        // A second confirmation does not rebuild the cube.
        m.handle_message(SyncMsg::RoomConfirmed {
            room_id: RoomId("other".into()),
            cube: snap,
        })
        .unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(m.room_id(), Some(&RoomId("xyz789".into())));
    }

    #[test]
    fn update_before_join_is_rejected() {
        let (mut m, mut rx) = manager(None);
        assert_eq!(
            m.update_cube(CubeKind::SelfCube, Vec3::ZERO),
            Err(ManagerError::NotReady)
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn self_update_reports_position() {
        let (mut m, mut rx, _log) = joined(1);
        let velocity = Vec3::new(0.05, -0.01, 0.0);

        let crashed = m.update_cube(CubeKind::SelfCube, velocity).unwrap();
        assert!(!crashed);

        match rx.try_recv().unwrap() {
            SyncMsg::SelfPosition { velocity: sent, cube } => {
                assert_eq!(sent, velocity);
                assert_eq!(cube, m.roster().self_cube().unwrap().snapshot());
            }
            other => panic!("expected SelfPosition, got {other:?}"),
        }
        // No local spawning in networked play.
        assert!(m.roster().enemies().is_empty());
    }

    #[test]
    fn self_update_with_closed_channel_fails() {
        let (mut m, rx, _log) = joined(1);
        drop(rx);
        assert_eq!(
            m.update_cube(CubeKind::SelfCube, Vec3::ZERO),
            Err(ManagerError::ChannelClosed)
        );
    }

    #[test]
    fn closed_channel_still_moves_enemies() {
        let (mut m, rx, _log) = joined(1);
        let far = player_cube()
            .with_position(Vec3::new(0.0, 0.0, -20.0))
            .with_velocity(Vec3::new(0.0, -0.01, 0.005))
            .snapshot();
        m.handle_message(SyncMsg::EnemySpawned { enemy: far }).unwrap();
        let self_z = m.roster().self_cube().unwrap().position.z;
        drop(rx);

        assert_eq!(
            m.update_cube(CubeKind::SelfCube, Vec3::new(0.0, -0.01, 0.1)),
            Err(ManagerError::ChannelClosed)
        );
        assert!(m.roster().self_cube().unwrap().position.z > self_z);
        assert!(m.roster().enemies()[0].position.z > -20.0);
    }

    #[test]
    fn companion_update_is_a_no_op() {
        let (mut m, mut rx, _log) = joined(1);
        assert_eq!(m.update_cube(CubeKind::Companion, Vec3::ZERO), Ok(false));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn enemy_broadcast_appends_and_crashes() {
        let (mut m, _rx, log) = joined(1);
        let on_top = player_cube().snapshot();
        m.handle_message(SyncMsg::EnemySpawned { enemy: on_top })
            .unwrap();

        assert_eq!(m.roster().enemies().len(), 1);
        assert_eq!(*log.lock().unwrap(), vec![CubeKind::Enemy]);
        assert_eq!(m.update_cube(CubeKind::SelfCube, Vec3::ZERO), Ok(true));
    }

    #[test]
    fn self_echo_is_ignored() {
        let (mut m, _rx, log) = joined(1);

        m.handle_message(SyncMsg::PeerJoined {
            id: ClientId(1),
            cube: peer_cube(),
        })
        .unwrap();
        m.handle_message(SyncMsg::PeerPosition {
            id: ClientId(1),
            velocity: Vec3::new(1.0, 0.0, 0.0),
            cube: peer_cube(),
        })
        .unwrap();

        assert!(m.roster().companion().is_none());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn peer_joined_builds_recolored_companion_and_steps_it() {
        let (mut m, _rx, log) = joined(1);
        let snap = peer_cube();

        m.handle_message(SyncMsg::PeerJoined {
            id: ClientId(2),
            cube: snap.clone(),
        })
        .unwrap();

        let companion = m.roster().companion().unwrap();
        assert_eq!(companion.appearance().color, COMPANION_COLOR);
        assert_ne!(companion.position, snap.position);
        assert_eq!(*log.lock().unwrap(), vec![CubeKind::Companion]);
    }

    #[test]
    fn peer_position_before_join_creates_companion_once() {
        let (mut m, _rx, log) = joined(1);

        for step in 0..3 {
            let velocity = Vec3::new(0.1 * (step + 1) as f32, 0.0, 0.0);
            m.handle_message(SyncMsg::PeerPosition {
                id: ClientId(2),
                velocity,
                cube: peer_cube(),
            })
            .unwrap();
            let companion = m.roster().companion().unwrap();
            assert_eq!(companion.velocity.x, velocity.x);
        }

        assert_eq!(*log.lock().unwrap(), vec![CubeKind::Companion]);
        let companion = m.roster().companion().unwrap();
        // 2.0 + 0.1 + 0.2 + 0.3
        assert!((companion.position.x - 2.6).abs() < 1e-5);
    }

    #[test]
    fn server_bound_messages_are_ignored() {
        let (mut m, mut rx, log) = joined(1);
        m.handle_message(SyncMsg::CreateRoom).unwrap();
        m.handle_message(SyncMsg::SelfPosition {
            velocity: Vec3::ZERO,
            cube: peer_cube(),
        })
        .unwrap();
        m.handle_message(SyncMsg::IdentityAssigned { id: ClientId(9) })
            .unwrap();

        assert_eq!(m.client_id(), Some(ClientId(1)));
        assert!(rx.try_recv().is_err());
        assert!(log.lock().unwrap().is_empty());
    }
}
