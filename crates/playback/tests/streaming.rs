//! End-to-end streaming tests: real WAV bytes (written with `hound`) played
//! through the full engine against the mock hardware backend, with the block
//! counter driven by hand.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::indexing_slicing)]

use std::io::Cursor;

use playback::audioout::{AudioOut, AudioOutError, PlaybackState};
use playback::stream::Refill;
use platform::arena::{AudioHardwareArena, PinId};
use platform::dma::BLOCK_LENGTH;
use platform::mocks::{FlakyFile, MemFile, MockAudioHardware};

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// Mono 16-bit WAV container holding `samples`, byte-identical to what a real
/// encoder produces.
fn wav_16(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("writer");
        for &s in samples {
            writer.write_sample(s).expect("sample");
        }
        writer.finalize().expect("finalize");
    }
    cursor.into_inner()
}

/// Mono 8-bit WAV container.
fn wav_8(sample_rate: u32, samples: &[i8]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 8,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("writer");
        for &s in samples {
            writer.write_sample(s).expect("sample");
        }
        writer.finalize().expect("finalize");
    }
    cursor.into_inner()
}

fn arena() -> AudioHardwareArena<MockAudioHardware> {
    AudioHardwareArena::new(MockAudioHardware::new())
}

// ─── Prefill and termination ─────────────────────────────────────────────────

#[test]
fn two_block_file_is_fully_loaded_by_play() {
    // 512 samples = 1 024 bytes = exactly two blocks.
    let bytes = wav_16(8_000, &[0i16; 512]);
    let file = MemFile::new(&bytes).expect("fits");
    let mut arena = arena();
    let mut out = AudioOut::from_file(&mut arena, PinId(0), file).expect("valid");

    out.play(&mut arena, false).expect("play");

    let stream = out.stream().expect("file-backed session");
    assert_eq!(stream.last_loaded_block(), 2);
    assert_eq!(stream.bytes_remaining(), 0);
    assert!(stream.is_ended());

    // The ring still runs primary → secondary, but the secondary's
    // next-link was cleared so the channel halts after block 2.
    let first = arena.hw().dma_first.expect("job started");
    let primary = arena.descriptors().get(first).expect("live");
    assert_eq!(primary.block_transfer_count, 256);
    let second_id = primary.next.expect("ring link intact");
    let secondary = arena.descriptors().get(second_id).expect("live");
    assert_eq!(secondary.block_transfer_count, 256, "final block is full");
    assert_eq!(secondary.next, None, "chain terminated");

    // Nothing left to refill.
    arena.hw_mut().advance_blocks(1);
    assert_eq!(out.background_tick(&mut arena), Ok(Refill::Idle));
}

#[test]
fn long_file_streams_one_block_per_tick() {
    // 5 000 samples = 10 000 bytes: 19 full blocks and a 272-byte tail.
    let bytes = wav_16(8_000, &vec![0i16; 5_000]);
    let file = MemFile::new(&bytes).expect("fits");
    let mut arena = arena();
    let mut out = AudioOut::from_file(&mut arena, PinId(0), file).expect("valid");
    out.play(&mut arena, false).expect("play");

    // Two blocks ahead already: an immediate tick has nothing to do.
    assert_eq!(out.background_tick(&mut arena), Ok(Refill::Idle));

    let mut loaded = Vec::new();
    loop {
        arena.hw_mut().advance_blocks(1);
        match out.background_tick(&mut arena).expect("tick") {
            Refill::Loaded { block, bytes } => loaded.push((block, bytes)),
            Refill::Finished { block, bytes } => {
                assert_eq!(block, 20);
                assert_eq!(bytes, 272);
                break;
            }
            Refill::Idle => panic!("counter is ahead, a refill was due"),
        }
    }
    // Blocks 3..=19, every one full.
    assert_eq!(loaded.len(), 17);
    assert_eq!(loaded.first(), Some(&(3, BLOCK_LENGTH)));
    assert_eq!(loaded.last(), Some(&(19, BLOCK_LENGTH)));
    assert!(loaded.iter().all(|&(_, bytes)| bytes == BLOCK_LENGTH));

    // Final descriptor trimmed to the tail: 272 bytes = 136 half-word beats.
    let first = arena.hw().dma_first.expect("job started");
    let primary = arena.descriptors().get(first).expect("live");
    // Block 20 is even, so the patch landed on the secondary buffer.
    let secondary = arena
        .descriptors()
        .get(primary.next.expect("primary keeps its link"))
        .expect("live");
    assert_eq!(secondary.block_transfer_count, 136);
    assert_eq!(secondary.next, None);

    // Stream exhausted; the engine goes quiet.
    assert_eq!(out.stream().expect("file").bytes_remaining(), 0);
    arena.hw_mut().advance_blocks(1);
    assert_eq!(out.background_tick(&mut arena), Ok(Refill::Idle));
}

#[test]
fn data_chunk_longer_than_the_file_truncates_silently() {
    // Header declares 2 048 data bytes but only 600 are present: the engine
    // plays what exists and terminates, without surfacing an error.
    let mut bytes = wav_8(8_000, &vec![0i8; 600]);
    let len_at = bytes.len() - 600 - 4;
    bytes[len_at..len_at + 4].copy_from_slice(&2_048u32.to_le_bytes());

    let file = MemFile::new(&bytes).expect("fits");
    let mut arena = arena();
    let mut out = AudioOut::from_file(&mut arena, PinId(0), file).expect("valid");
    out.play(&mut arena, false).expect("play");

    let stream = out.stream().expect("file-backed session");
    assert!(stream.is_ended());
    assert_eq!(stream.last_loaded_block(), 2);

    let first = arena.hw().dma_first.expect("job started");
    let primary = arena.descriptors().get(first).expect("live");
    let secondary = arena
        .descriptors()
        .get(primary.next.expect("link"))
        .expect("live");
    assert_eq!(secondary.block_transfer_count, 88, "88 real bytes in block 2");
    assert_eq!(secondary.next, None);
}

#[test]
fn lying_header_with_no_backing_bytes_terminates_even_when_looping() {
    // A parseable header declaring 2 048 data bytes over an empty data
    // chunk: the loop wrap finds nothing to read and must end the stream
    // instead of retrying forever.
    let mut bytes = wav_8(8_000, &[]);
    let n = bytes.len();
    bytes[n - 4..].copy_from_slice(&2_048u32.to_le_bytes());

    let file = MemFile::new(&bytes).expect("fits");
    let mut arena = arena();
    let mut out = AudioOut::from_file(&mut arena, PinId(0), file).expect("valid header");
    out.play(&mut arena, true).expect("play returns");

    let stream = out.stream().expect("file-backed session");
    assert!(stream.is_ended());
    assert_eq!(stream.last_loaded_block(), 1);

    let first = arena.hw().dma_first.expect("job started");
    let primary = arena.descriptors().get(first).expect("live");
    assert_eq!(primary.block_transfer_count, 0);
    assert_eq!(primary.next, None, "chain terminated at the empty block");

    // The background tick has nothing left to do either.
    arena.hw_mut().advance_blocks(1);
    assert_eq!(out.background_tick(&mut arena), Ok(Refill::Idle));
}

// ─── Looping ─────────────────────────────────────────────────────────────────

#[test]
fn looping_stream_refills_forever() {
    // 350 samples = 700 bytes: block 2 wraps back into the start of the data.
    let bytes = wav_16(8_000, &vec![0i16; 350]);
    let file = MemFile::new(&bytes).expect("fits");
    let mut arena = arena();
    let mut out = AudioOut::from_file(&mut arena, PinId(0), file).expect("valid");
    out.play(&mut arena, true).expect("play");

    for _ in 0..1_000 {
        arena.hw_mut().advance_blocks(1);
        let outcome = out.background_tick(&mut arena).expect("tick");
        assert!(
            matches!(outcome, Refill::Loaded { bytes: BLOCK_LENGTH, .. }),
            "looping refills are always full blocks, got {outcome:?}"
        );
    }
    let stream = out.stream().expect("file-backed session");
    assert!(!stream.is_ended());
    assert_eq!(stream.last_loaded_block(), 1_002);

    // The ring was never patched: both links still stand.
    let first = arena.hw().dma_first.expect("job started");
    let primary = arena.descriptors().get(first).expect("live");
    let second_id = primary.next.expect("ring intact");
    let secondary = arena.descriptors().get(second_id).expect("live");
    assert_eq!(secondary.next, Some(first));

    assert!(out.get_playing(&mut arena));
}

#[test]
fn sub_block_loop_tiles_the_buffer() {
    // A 100-byte 8-bit file loops five-and-a-bit times inside every block.
    let pattern: Vec<i8> = (0..100).map(|i| (i as i8).wrapping_sub(50)).collect();
    let bytes = wav_8(8_000, &pattern);
    let file = MemFile::new(&bytes).expect("fits");
    let mut arena = arena();
    let mut out = AudioOut::from_file(&mut arena, PinId(0), file).expect("valid");
    out.play(&mut arena, true).expect("play");

    let stream = out.stream().expect("file-backed session");
    let block = stream.buffer(0, BLOCK_LENGTH).expect("full block");
    // 8-bit WAV stores unsigned bytes; the pattern arrives offset by 128 and
    // tiles the block end to end with no conditioning applied.
    for (i, &b) in block.iter().enumerate() {
        let expected = ((i % 100) as i8).wrapping_sub(50) as u8 ^ 0x80;
        assert_eq!(b, expected, "offset {i}");
    }
}

// ─── Conditioning ────────────────────────────────────────────────────────────

#[test]
fn sixteen_bit_blocks_are_biased_exactly_once() {
    // Silence in signed PCM is 0x0000; after the one-time bias flip the DAC
    // sees midscale 0x8000 in every sample, including the wrapped tail.
    let bytes = wav_16(8_000, &[0i16; 150]); // 300 bytes, wraps inside block 1
    let file = MemFile::new(&bytes).expect("fits");
    let mut arena = arena();
    let mut out = AudioOut::from_file(&mut arena, PinId(0), file).expect("valid");
    out.play(&mut arena, true).expect("play");

    let stream = out.stream().expect("file-backed session");
    let block = stream.buffer(0, BLOCK_LENGTH).expect("full block");
    for pair in block.chunks_exact(2) {
        assert_eq!(pair, [0x00, 0x80]);
    }
}

// ─── Failure paths ───────────────────────────────────────────────────────────

#[test]
fn refill_failure_stops_playback_cleanly() {
    let bytes = wav_16(8_000, &vec![0i16; 1_024]); // 4 blocks
    let inner = MemFile::new(&bytes).expect("fits");
    // Budget: 5 header reads + 2 prefill block reads succeed, then the
    // storage dies under the background refill.
    let file = FlakyFile::new(inner, 7);

    let mut arena = arena();
    let mut out = AudioOut::from_file(&mut arena, PinId(0), file).expect("valid");
    out.play(&mut arena, false).expect("play");

    arena.hw_mut().advance_blocks(1);
    assert_eq!(out.background_tick(&mut arena), Err(AudioOutError::Io));

    assert_eq!(out.state(), PlaybackState::Stopped);
    assert!(!arena.hw().dma_running, "job aborted, not drained");
    assert!(!arena.hw().dac_enabled);
    assert_eq!(arena.descriptors().occupied(), 0, "buffers returned");
}

#[test]
fn descriptor_exhaustion_unwinds_play() {
    let bytes = wav_16(8_000, &[0i16; 512]);
    let file = MemFile::new(&bytes).expect("fits");
    let mut arena = arena();

    // Burn every descriptor slot.
    let mut held = Vec::new();
    while let Ok(id) = arena.alloc_descriptor(platform::dma::DmaDescriptor {
        src: platform::dma::BufferId::External,
        len_bytes: 0,
        beat: platform::dma::BeatSize::Byte,
        block_transfer_count: 0,
        next: None,
    }) {
        held.push(id);
    }

    let mut out = AudioOut::from_file(&mut arena, PinId(0), file).expect("valid");
    let err = out.play(&mut arena, false).unwrap_err();
    assert!(matches!(err, AudioOutError::Resource(_)));
    assert_eq!(out.state(), PlaybackState::Idle, "never reached Playing");
    assert!(!arena.hw().dac_enabled);
}

// ─── Contention ──────────────────────────────────────────────────────────────

#[test]
fn preempted_session_returns_its_descriptors() {
    let bytes = wav_16(8_000, &vec![0i16; 1_024]);
    let mut arena = arena();
    let file_a = MemFile::new(&bytes).expect("fits");
    let mut a = AudioOut::from_file(&mut arena, PinId(0), file_a).expect("valid");

    let raw = [0u8; 16];
    let mut b = AudioOut::from_buffer(&mut arena, PinId(1), &raw, 8).expect("valid");

    a.play(&mut arena, false).expect("play a");
    assert_eq!(arena.descriptors().occupied(), 2);

    b.play(&mut arena, false).expect("play b supersedes");
    // a's pair is still allocated until a notices it lost the hardware.
    assert_eq!(arena.descriptors().occupied(), 3);

    assert!(!a.get_playing(&mut arena));
    assert_eq!(arena.descriptors().occupied(), 1, "only b's descriptor left");
    assert!(b.get_playing(&mut arena));

    // a's maintenance goes quiet rather than clobbering b's stream.
    arena.hw_mut().advance_blocks(1);
    assert_eq!(a.background_tick(&mut arena), Ok(Refill::Idle));
}
