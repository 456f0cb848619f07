//! GameSession integration tests (driven through an in-process MemoryLink)

#[cfg(test)]
mod tests {
    use arena_sync::{
        animation::AnimationState,
        controller::InputState,
        events::RelayEvent,
        identity::Identity,
        link::{MemoryLink, RelayLink},
        physics::KinematicBody,
        protocol::{destinations, topics, CombatEvent, ObjectPosition, PlayerSnapshot, SceneObjectUpdate},
        session::{GameSession, TickInput},
        types::{PlayerId, Vec3},
        SyncConfig,
    };

    const DT: f32 = 1.0 / 60.0;

    fn make_session() -> (GameSession, MemoryLink) {
        let link = MemoryLink::new();
        let config = SyncConfig::default();
        let identity = Identity {
            id: PlayerId::new("me"),
            nickname: Some("neo".into()),
        };
        let body = KinematicBody::new(config.movement.spawn_point);
        let session = GameSession::new(config, identity, Box::new(link.clone()), Box::new(body));
        (session, link)
    }

    fn idle() -> TickInput {
        TickInput {
            dt: DT,
            ..Default::default()
        }
    }

    fn with_input(input: InputState) -> TickInput {
        TickInput {
            dt: DT,
            input,
            props: Vec::new(),
        }
    }

    fn remote(id: &str, position: Vec3) -> PlayerSnapshot {
        PlayerSnapshot {
            id: PlayerId::new(id),
            position,
            rotation_y: 0.0,
            nickname: Some(id.to_uppercase()),
            animation_state: AnimationState::idle(),
        }
    }

    fn hit(from: &str, target: &str) -> RelayEvent {
        RelayEvent::PlayerHit(CombatEvent {
            from_id: PlayerId::new(from),
            target_id: PlayerId::new(target),
        })
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    #[test]
    fn register_precedes_first_move() {
        let (mut session, link) = make_session();
        link.connect();
        session.tick(idle());

        let published = link.published();
        assert!(published.len() >= 2);
        assert_eq!(published[0].destination, destinations::REGISTER_PLAYER);
        assert_eq!(published[1].destination, destinations::PLAYER_MOVE);
        assert_eq!(published[0].json()["id"], "me");
        assert_eq!(published[0].json()["nickname"], "neo");
        assert!(session.is_registered());
    }

    #[test]
    fn register_exactly_once_per_connection() {
        let (mut session, link) = make_session();
        link.connect();
        for _ in 0..10 {
            session.tick(idle());
        }
        assert_eq!(link.published_to(destinations::REGISTER_PLAYER).len(), 1);
        assert_eq!(link.published_to(destinations::PLAYER_MOVE).len(), 10);

        link.drop_connection("relay restarted");
        session.tick(idle());
        assert!(!session.is_registered());

        link.connect();
        session.tick(idle());
        assert_eq!(link.published_to(destinations::REGISTER_PLAYER).len(), 2);
    }

    #[test]
    fn registers_even_when_connected_event_is_lost() {
        let (mut session, link) = make_session();
        link.connect();
        // The event queue overflowed and the Connected event never arrives.
        let lost = link.poll_events(usize::MAX);
        assert_eq!(lost, vec![RelayEvent::Connected { session: None }]);

        for _ in 0..120 {
            session.tick(idle());
        }
        assert!(session.is_registered());
        assert_eq!(link.published_to(destinations::REGISTER_PLAYER).len(), 1);
        assert_eq!(link.published_to(destinations::PLAYER_MOVE).len(), 120);
    }

    #[test]
    fn reregisters_when_disconnect_event_is_lost() {
        let (mut session, link) = make_session();
        link.connect();
        session.tick(idle());

        // Drop and reconnect between two ticks, losing both lifecycle events.
        link.drop_connection("socket reset");
        link.connect();
        link.poll_events(usize::MAX);

        session.tick(idle());
        let published = link.published();
        let registers: Vec<_> = published
            .iter()
            .enumerate()
            .filter(|(_, p)| p.destination == destinations::REGISTER_PLAYER)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(registers.len(), 2);
        assert_eq!(
            published[registers[1] + 1].destination,
            destinations::PLAYER_MOVE
        );
        assert!(session.is_registered());
    }

    #[test]
    fn nothing_published_while_disconnected() {
        let (mut session, link) = make_session();
        for _ in 0..5 {
            session.tick(with_input(InputState {
                forward: true,
                punch: true,
                ..Default::default()
            }));
        }
        assert!(link.published().is_empty());
    }

    // -----------------------------------------------------------------------
    // Remote players
    // -----------------------------------------------------------------------

    #[test]
    fn own_snapshot_never_enters_the_registry() {
        let (mut session, link) = make_session();
        link.connect();
        link.inject(RelayEvent::PlayerLocations(vec![
            remote("me", Vec3::zero()),
            remote("a", Vec3::new(3.0, 1.0, 0.0)),
        ]));
        let frame = session.tick(idle());

        assert_eq!(session.registry().len(), 1);
        assert!(!session.registry().contains(&PlayerId::new("me")));
        assert_eq!(frame.hud.remote_players, 1);
    }

    #[test]
    fn roster_broadcast_drops_absent_players() {
        let (mut session, link) = make_session();
        link.inject(RelayEvent::PlayerLocations(vec![
            remote("a", Vec3::zero()),
            remote("b", Vec3::zero()),
        ]));
        session.tick(idle());
        assert_eq!(session.registry().len(), 2);

        link.inject(RelayEvent::PlayerLocations(vec![remote("b", Vec3::zero())]));
        session.tick(idle());
        assert_eq!(session.registry().len(), 1);
        assert!(session.registry().contains(&PlayerId::new("b")));
    }

    #[test]
    fn later_snapshot_wins() {
        let (mut session, link) = make_session();
        link.inject(RelayEvent::PlayerLocations(vec![remote("a", Vec3::new(1.0, 1.0, 0.0))]));
        link.inject(RelayEvent::PlayerLocations(vec![remote("a", Vec3::new(9.0, 1.0, 0.0))]));
        session.tick(idle());

        let entry = session.registry().get(&PlayerId::new("a")).unwrap();
        assert_eq!(entry.target_position().x, 9.0);
        assert_eq!(entry.display_name(), "A");
    }

    // -----------------------------------------------------------------------
    // Combat
    // -----------------------------------------------------------------------

    #[test]
    fn punch_publishes_hit_for_player_in_front() {
        let (mut session, link) = make_session();
        link.connect();
        link.inject(RelayEvent::PlayerLocations(vec![
            remote("front", Vec3::new(0.0, 1.0, 1.0)),
            remote("far", Vec3::new(0.0, 1.0, 5.0)),
        ]));
        session.tick(idle());
        link.clear_published();

        session.tick(with_input(InputState {
            punch: true,
            ..Default::default()
        }));

        let hits = link.published_to(destinations::PLAYER_HIT);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].json()["fromId"], "me");
        assert_eq!(hits[0].json()["targetId"], "front");
    }

    #[test]
    fn remote_hit_raises_overlay_only() {
        let (mut session, link) = make_session();
        link.inject(RelayEvent::PlayerLocations(vec![remote("a", Vec3::zero())]));
        link.inject(hit("b", "a"));
        link.inject(hit("b", "ghost"));
        session.tick(idle());

        assert!(session.registry().get(&PlayerId::new("a")).unwrap().is_hit());
        assert_eq!(session.combat().health(), 100);
    }

    #[test]
    fn ten_hits_kill_and_respawn_restores_health() {
        let (mut session, link) = make_session();
        link.connect();
        session.tick(idle());

        link.inject(hit("a", "me"));
        let frame = session.tick(idle());
        assert_eq!(frame.hud.health, 90);
        assert!(frame.hud.is_hit);

        for _ in 0..9 {
            link.inject(hit("a", "me"));
        }
        let frame = session.tick(idle());
        assert_eq!(frame.hud.health, 0);
        assert!(frame.hud.is_dead);

        // Further hits while dead do not restart the countdown.
        session.tick(idle());
        let remaining = session.combat().respawn_remaining();
        link.inject(hit("a", "me"));
        session.tick(idle());
        assert!(session.combat().respawn_remaining() < remaining);

        let moves = link.published_to(destinations::PLAYER_MOVE);
        let last = moves.last().unwrap().json();
        assert_eq!(last["animationState"]["isDead"], true);
        assert_eq!(last["animationState"]["isIdle"], false);

        link.clear_published();
        for _ in 0..320 {
            session.tick(idle());
        }

        let respawns = link.published_to(destinations::PLAYER_RESPAWN);
        assert_eq!(respawns.len(), 1);
        assert_eq!(respawns[0].json()["health"], 100);
        assert_eq!(respawns[0].json()["id"], "me");
        assert_eq!(session.combat().health(), 100);
        assert!(!session.combat().is_dead());
    }

    #[test]
    fn dead_player_cannot_move() {
        let (mut session, link) = make_session();
        for _ in 0..10 {
            link.inject(hit("a", "me"));
        }
        session.tick(idle());
        let start = session.controller().position();

        let frame = session.tick(with_input(InputState {
            forward: true,
            ..Default::default()
        }));
        assert_eq!(frame.hud.velocity.x, 0.0);
        assert_eq!(frame.hud.velocity.z, 0.0);
        assert_eq!(session.controller().position().z, start.z);
    }

    // -----------------------------------------------------------------------
    // Scene props
    // -----------------------------------------------------------------------

    #[test]
    fn props_published_only_when_present() {
        let (mut session, link) = make_session();
        link.connect();
        session.tick(idle());
        assert!(link.published_to(destinations::SCENE_OBJECTS).is_empty());

        session.tick(TickInput {
            dt: DT,
            input: InputState::default(),
            props: vec![ObjectPosition {
                id: "ball-1".into(),
                position: Vec3::new(2.0, 0.5, 2.0),
            }],
        });
        let sent = link.published_to(destinations::SCENE_OBJECTS);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].json()[0]["id"], "ball-1");
    }

    #[test]
    fn inbound_props_are_merged() {
        let (mut session, link) = make_session();
        link.inject(RelayEvent::SceneObjects(vec![SceneObjectUpdate {
            id: "crate".into(),
            position: Vec3::new(1.0, 0.0, 0.0),
            kind: Some("box".into()),
            size: Some(Vec3::new(1.0, 1.0, 1.0)),
            radius: None,
            color: Some("brown".into()),
            collider: Some("cuboid".into()),
        }]));
        session.tick(idle());
        assert_eq!(session.scene().len(), 1);
        assert_eq!(session.scene().get("crate").unwrap().color, "brown");
    }

    // -----------------------------------------------------------------------
    // Decoding
    // -----------------------------------------------------------------------

    #[test]
    fn malformed_body_is_an_error_not_a_panic() {
        assert!(RelayEvent::decode(topics::PLAYER_LOCATIONS, "{not json").is_err());
        assert!(RelayEvent::decode(topics::PLAYER_HIT, r#"{"fromId":"a"}"#).is_err());
        assert_eq!(RelayEvent::decode("/topic/unknown", "[]").unwrap(), None);
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    #[test]
    fn shutdown_is_idempotent() {
        let (mut session, link) = make_session();
        link.connect();
        session.tick(idle());

        session.shutdown();
        session.shutdown();
        assert_eq!(link.published_to(destinations::UNREGISTER_PLAYER).len(), 1);
        assert!(link.is_closed());

        link.clear_published();
        session.tick(idle());
        drop(session);
        assert!(link.published().is_empty());
    }

    #[test]
    fn no_unregister_without_registration() {
        let (mut session, link) = make_session();
        session.tick(idle());
        session.shutdown();
        assert!(link.published_to(destinations::UNREGISTER_PLAYER).is_empty());
        assert!(link.is_closed());
    }
}
