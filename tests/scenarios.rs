//! End-to-end acceptance scenarios against the public `Engine` façade
//! (spec.md §8, S1-S6), plus a couple of multi-subsystem checks that don't
//! fit any one unit test module.

use lumina_dmx::config::EngineConfig;
use lumina_dmx::descriptors::{
    ChannelRange, InputDescriptor, InputProtocol, MergeMode, PassthroughConfig, PassthroughMode,
};
use lumina_dmx::engine::events::SourceTag;
use lumina_dmx::engine::Engine;
use lumina_dmx::groups::color::Hsl;
use lumina_dmx::groups::{Group, GroupMode, MemberTarget};
use lumina_dmx::universe::Frame;

fn channel_member(universe: u32, channel: u16, base_value: u8) -> MemberTarget {
    MemberTarget::Channel { universe, channel, base_value, color_role: None }
}

#[test]
fn s1_local_fader_with_global_mute() {
    let engine = Engine::new(EngineConfig::default());
    engine.set_global_grandmaster(128);
    engine.set_channel(1, 5, 200, SourceTag::Local);

    let wire = engine.wire_frame(1);
    assert_eq!(wire.get(5), ((200u32 * 128 + 127) / 255) as u8);
    assert_eq!(wire.get(1), 0);
}

#[test]
fn s2_htp_merge_picks_the_larger_value() {
    let engine = Engine::new(EngineConfig::default());
    let descriptor = InputDescriptor {
        universe: 1,
        protocol: InputProtocol::Artnet(lumina_dmx::descriptors::ArtNetConfig {
            target_ip: "0.0.0.0".parse().unwrap(),
            broadcast: true,
            wire_universe: 0,
        }),
        channel_range: ChannelRange::FULL,
        filter: Default::default(),
        passthrough: PassthroughConfig { mode: PassthroughMode::FadersOutput, merge: MergeMode::Htp },
    };
    engine.set_input(descriptor);

    engine.set_channel(1, 1, 150, SourceTag::Local);
    let mut frame = Frame::zeroed();
    frame.set(1, 200);
    engine.handle_input_frame(1, frame);

    assert_eq!(engine.wire_frame(1).get(1), 200);
}

#[test]
fn s3_ltp_suppresses_small_jitter_but_passes_real_moves() {
    let engine = Engine::new(EngineConfig::default());
    let descriptor = InputDescriptor {
        universe: 1,
        protocol: InputProtocol::Artnet(lumina_dmx::descriptors::ArtNetConfig {
            target_ip: "0.0.0.0".parse().unwrap(),
            broadcast: true,
            wire_universe: 0,
        }),
        channel_range: ChannelRange::FULL,
        filter: Default::default(),
        passthrough: PassthroughConfig { mode: PassthroughMode::FadersOutput, merge: MergeMode::Ltp },
    };
    engine.set_input(descriptor);

    let mut frame = Frame::zeroed();
    frame.set(1, 100);
    engine.handle_input_frame(1, frame);
    assert_eq!(engine.wire_frame(1).get(1), 100);

    let mut frame = Frame::zeroed();
    frame.set(1, 101);
    engine.handle_input_frame(1, frame);
    assert_eq!(engine.wire_frame(1).get(1), 100, "a 1-unit move is jitter, under the threshold of 2");

    let mut frame = Frame::zeroed();
    frame.set(1, 103);
    engine.handle_input_frame(1, frame);
    assert_eq!(engine.wire_frame(1).get(1), 103, "a 3-unit move clears the jitter threshold");

    let mut frame = Frame::zeroed();
    frame.set(1, 0);
    engine.handle_input_frame(1, frame);
    assert_eq!(engine.wire_frame(1).get(1), 0, "a move to zero always applies regardless of threshold");
}

#[test]
fn s4_proportional_group_scales_every_member_from_its_own_base() {
    let engine = Engine::new(EngineConfig::default());
    let mut group = Group::new(1, "dimmers", GroupMode::Proportional);
    group.members.push(channel_member(1, 10, 255));
    group.members.push(channel_member(1, 11, 128));
    engine.add_group(group);

    engine.apply_group_direct(1, 255).unwrap();
    let wire = engine.wire_frame(1);
    assert_eq!(wire.get(10), 255);
    assert_eq!(wire.get(11), 128);

    engine.apply_group_direct(1, 128).unwrap();
    let wire = engine.wire_frame(1);
    assert_eq!(wire.get(10), 128);
    assert_eq!(wire.get(11), ((128u32 * 128 + 127) / 255) as u8);
}

#[test]
fn s5_park_overrides_group_write_at_emit_time_only() {
    let engine = Engine::new(EngineConfig::default());
    let mut group = Group::new(1, "dimmers", GroupMode::Proportional);
    group.members.push(channel_member(1, 10, 255));
    group.members.push(channel_member(1, 11, 128));
    engine.add_group(group);
    engine.park_channel(1, 10, 50);

    engine.apply_group_direct(1, 255).unwrap();
    let wire = engine.wire_frame(1);
    assert_eq!(wire.get(10), 50, "park wins over the group's computed value on the wire");
    assert_eq!(wire.get(11), 128);
    assert_eq!(
        engine.output_frame(1).get(10),
        255,
        "the group's own composed output is unaffected by park; only emit is"
    );
}

#[test]
fn s6_color_mixer_white_and_pure_red() {
    let engine = Engine::new(EngineConfig::default());
    let mut group = Group::new(1, "wash", GroupMode::ColorMixer);
    group.members.push(MemberTarget::Channel {
        universe: 1,
        channel: 1,
        base_value: 255,
        color_role: Some(lumina_dmx::groups::color::ColorRole::Red),
    });
    group.members.push(MemberTarget::Channel {
        universe: 1,
        channel: 2,
        base_value: 255,
        color_role: Some(lumina_dmx::groups::color::ColorRole::Green),
    });
    group.members.push(MemberTarget::Channel {
        universe: 1,
        channel: 3,
        base_value: 255,
        color_role: Some(lumina_dmx::groups::color::ColorRole::Blue),
    });
    engine.add_group(group);

    engine.set_group_color(1, Hsl { h: 0.0, s: 0.0, l: 100.0 }).unwrap();
    engine.apply_group_direct(1, 255).unwrap();
    let wire = engine.wire_frame(1);
    assert_eq!((wire.get(1), wire.get(2), wire.get(3)), (255, 255, 255));

    engine.set_group_color(1, Hsl { h: 0.0, s: 100.0, l: 50.0 }).unwrap();
    engine.apply_group_direct(1, 200).unwrap();
    let wire = engine.wire_frame(1);
    assert_eq!((wire.get(1), wire.get(2), wire.get(3)), (200, 0, 0));
}

#[test]
fn blackout_zeroes_the_wire_then_release_restores_exact_prior_state() {
    let engine = Engine::new(EngineConfig::default());
    engine.set_channel(1, 1, 200, SourceTag::Local);
    engine.set_channel(1, 2, 50, SourceTag::Local);

    engine.blackout();
    assert_eq!(engine.wire_frame(1).get_all(), &[0u8; 512]);

    engine.release_blackout();
    assert_eq!(engine.output_frame(1).get(1), 200);
    assert_eq!(engine.output_frame(1).get(2), 50);
}

#[test]
fn reverse_routing_ambiguous_member_is_rejected_not_applied() {
    let engine = Engine::new(EngineConfig::default());
    let mut g1 = Group::new(1, "a", GroupMode::Follow);
    g1.members.push(channel_member(1, 5, 255));
    let mut g2 = Group::new(2, "b", GroupMode::Follow);
    g2.members.push(channel_member(1, 5, 255));
    engine.add_group(g1);
    engine.add_group(g2);

    engine.set_channel(1, 5, 77, SourceTag::Local);
    assert_eq!(engine.output_frame(1).get(5), 0, "a write to a channel shared by two groups is rejected outright");
}
