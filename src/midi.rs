//! MIDI export (spec §6): format 1, 480 ticks/quarter, General MIDI program
//! mapping. Ported byte-for-byte from `MIDIExporter.cpp`, including its
//! time-signature-denominator quirk (see DESIGN.md Open Question decisions).

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MidiError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MidiResult<T> = Result<T, MidiError>;

const TICKS_PER_BEAT: u32 = 480;

#[derive(Debug, Clone, Copy)]
pub struct MidiNote {
    pub time_beats: f32,
    pub duration_beats: f32,
    pub pitch: u8,
    pub velocity: u8,
}

impl MidiNote {
    pub fn new(time_beats: f32, duration_beats: f32, pitch: u8, velocity: u8) -> Self {
        MidiNote { time_beats, duration_beats, pitch, velocity }
    }
}

#[derive(Debug, Clone)]
pub struct MidiTrack {
    pub name: String,
    pub channel: u8,
    pub program: u8,
    pub notes: Vec<MidiNote>,
}

impl MidiTrack {
    pub fn new(name: impl Into<String>, channel: u8, program: u8) -> Self {
        MidiTrack { name: name.into(), channel, program, notes: Vec::new() }
    }

    pub fn add_note(&mut self, note: MidiNote) {
        self.notes.push(note);
    }
}

/// Builds a named track, channel and program fixed, directly from a note list.
pub fn create_track_from_notes(name: &str, notes: &[MidiNote], channel: u8, program: u8) -> MidiTrack {
    let mut track = MidiTrack::new(name, channel, program);
    track.notes.extend_from_slice(notes);
    track
}

/// General MIDI program number for a named instrument; unknown names default to piano.
pub fn gm_program(instrument: &str) -> u8 {
    match instrument {
        "Piano" | "piano" => 0,
        "Guitar" | "guitar" => 24,
        "Bass" | "bass" => 33,
        "Strings" => 48,
        "Synth Lead" | "lead" => 80,
        "Synth Pad" | "pad" => 88,
        "Drums" | "drums" => 0,
        _ => 0,
    }
}

#[derive(Debug, Clone)]
pub struct MidiFile {
    tempo_bpm: f32,
    time_sig_num: u8,
    time_sig_den: u8,
    tracks: Vec<MidiTrack>,
}

impl Default for MidiFile {
    fn default() -> Self {
        MidiFile { tempo_bpm: 120.0, time_sig_num: 4, time_sig_den: 4, tracks: Vec::new() }
    }
}

impl MidiFile {
    pub fn new() -> Self {
        MidiFile::default()
    }

    pub fn set_tempo(&mut self, bpm: f32) {
        self.tempo_bpm = bpm;
    }

    pub fn set_time_signature(&mut self, numerator: u8, denominator: u8) {
        self.time_sig_num = numerator;
        self.time_sig_den = denominator;
    }

    pub fn add_track(&mut self, track: MidiTrack) {
        self.tracks.push(track);
    }

    pub fn save(&self, path: &Path) -> MidiResult<()> {
        let mut data = Vec::new();
        write_header(&mut data, self.tracks.len() as u16);
        for track in &self.tracks {
            write_track(&mut data, track, self.tempo_bpm, self.time_sig_num, self.time_sig_den);
        }
        std::fs::write(path, data)?;
        Ok(())
    }
}

/// `exportToMIDI`: builds a fresh `MidiFile` at `tempo` from `tracks` and saves it.
pub fn export_to_midi(path: &Path, tracks: Vec<MidiTrack>, tempo: f32) -> MidiResult<()> {
    let mut file = MidiFile::new();
    file.set_tempo(tempo);
    for track in tracks {
        file.add_track(track);
    }
    file.save(path)
}

fn write_variable_length(data: &mut Vec<u8>, value: u32) {
    let mut value = value;
    let mut buffer = value & 0x7F;
    value >>= 7;
    while value != 0 {
        buffer <<= 8;
        buffer |= (value & 0x7F) | 0x80;
        value >>= 7;
    }
    loop {
        data.push((buffer & 0xFF) as u8);
        if buffer & 0x80 != 0 {
            buffer >>= 8;
        } else {
            break;
        }
    }
}

fn beats_to_ticks(beats: f32) -> u32 {
    (beats * TICKS_PER_BEAT as f32) as u32
}

fn write_header(data: &mut Vec<u8>, num_tracks: u16) {
    data.extend_from_slice(b"MThd");
    data.extend_from_slice(&[0, 0, 0, 6]);
    data.extend_from_slice(&[0, 1]); // format 1
    data.push((num_tracks >> 8) as u8);
    data.push((num_tracks & 0xFF) as u8);
    data.push((TICKS_PER_BEAT >> 8) as u8);
    data.push((TICKS_PER_BEAT & 0xFF) as u8);
}

enum NoteEvent {
    On { pitch: u8, velocity: u8, channel: u8 },
    Off { pitch: u8, channel: u8 },
}

fn write_track(data: &mut Vec<u8>, track: &MidiTrack, tempo_bpm: f32, time_sig_num: u8, time_sig_den: u8) {
    let mut track_data = Vec::new();

    if !track.name.is_empty() {
        write_variable_length(&mut track_data, 0);
        track_data.push(0xFF);
        track_data.push(0x03);
        write_variable_length(&mut track_data, track.name.len() as u32);
        track_data.extend_from_slice(track.name.as_bytes());
    }

    let microseconds_per_beat = (60_000_000.0 / tempo_bpm) as u32;
    write_variable_length(&mut track_data, 0);
    track_data.push(0xFF);
    track_data.push(0x51);
    track_data.push(0x03);
    track_data.push(((microseconds_per_beat >> 16) & 0xFF) as u8);
    track_data.push(((microseconds_per_beat >> 8) & 0xFF) as u8);
    track_data.push((microseconds_per_beat & 0xFF) as u8);

    write_variable_length(&mut track_data, 0);
    track_data.push(0xFF);
    track_data.push(0x58);
    track_data.push(0x04);
    track_data.push(time_sig_num);
    track_data.push(if time_sig_den == 2 { 1 } else { 2 });
    track_data.push(24);
    track_data.push(8);

    write_variable_length(&mut track_data, 0);
    track_data.push(0xC0 | track.channel);
    track_data.push(track.program);

    let mut events: Vec<(u32, NoteEvent)> = Vec::with_capacity(track.notes.len() * 2);
    for note in &track.notes {
        let start_tick = beats_to_ticks(note.time_beats);
        let end_tick = beats_to_ticks(note.time_beats + note.duration_beats);
        events.push((start_tick, NoteEvent::On { pitch: note.pitch, velocity: note.velocity, channel: track.channel }));
        events.push((end_tick, NoteEvent::Off { pitch: note.pitch, channel: track.channel }));
    }
    events.sort_by_key(|(tick, _)| *tick);

    let mut last_tick = 0u32;
    let mut i = 0;
    while i + 1 < events.len() {
        let (on_tick, on_event) = &events[i];
        let (off_tick, off_event) = &events[i + 1];

        let delta_on = on_tick - last_tick;
        write_variable_length(&mut track_data, delta_on);
        if let NoteEvent::On { pitch, velocity, channel } = on_event {
            track_data.push(0x90 | channel);
            track_data.push(*pitch);
            track_data.push(*velocity);
        }
        last_tick = *on_tick;

        let delta_off = off_tick - last_tick;
        write_variable_length(&mut track_data, delta_off);
        if let NoteEvent::Off { pitch, channel } = off_event {
            track_data.push(0x80 | channel);
            track_data.push(*pitch);
            track_data.push(0);
        }
        last_tick = *off_tick;

        i += 2;
    }

    write_variable_length(&mut track_data, 0);
    track_data.push(0xFF);
    track_data.push(0x2F);
    track_data.push(0x00);

    data.extend_from_slice(b"MTrk");
    let track_length = track_data.len() as u32;
    data.extend_from_slice(&track_length.to_be_bytes());
    data.extend_from_slice(&track_data);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parses just enough of the file back out to check round-trip: header
    /// counts and each track's note-on pitch/velocity/tick sequence.
    struct ParsedTrack {
        note_ons: Vec<(u8, u8, u32)>,
    }

    fn parse_midi(bytes: &[u8]) -> (u16, Vec<ParsedTrack>) {
        assert_eq!(&bytes[0..4], b"MThd");
        let num_tracks = u16::from_be_bytes([bytes[10], bytes[11]]);
        let mut cursor = 14usize;
        let mut tracks = Vec::new();
        for _ in 0..num_tracks {
            assert_eq!(&bytes[cursor..cursor + 4], b"MTrk");
            let len = u32::from_be_bytes([
                bytes[cursor + 4],
                bytes[cursor + 5],
                bytes[cursor + 6],
                bytes[cursor + 7],
            ]) as usize;
            let body = &bytes[cursor + 8..cursor + 8 + len];
            tracks.push(parse_track_body(body));
            cursor += 8 + len;
        }
        (num_tracks, tracks)
    }

    fn read_varlen(body: &[u8], pos: &mut usize) -> u32 {
        let mut value = 0u32;
        loop {
            let byte = body[*pos];
            *pos += 1;
            value = (value << 7) | (byte & 0x7F) as u32;
            if byte & 0x80 == 0 {
                break;
            }
        }
        value
    }

    fn parse_track_body(body: &[u8]) -> ParsedTrack {
        let mut pos = 0usize;
        let mut tick = 0u32;
        let mut note_ons = Vec::new();
        while pos < body.len() {
            let delta = read_varlen(body, &mut pos);
            tick += delta;
            let status = body[pos];
            if status == 0xFF {
                pos += 1;
                let meta_type = body[pos];
                pos += 1;
                let len = read_varlen(body, &mut pos) as usize;
                pos += len;
                if meta_type == 0x2F {
                    break;
                }
            } else if status & 0xF0 == 0x90 {
                pos += 1;
                let pitch = body[pos];
                let velocity = body[pos + 1];
                pos += 2;
                note_ons.push((pitch, velocity, tick));
            } else if status & 0xF0 == 0x80 || status & 0xF0 == 0xC0 {
                let len = if status & 0xF0 == 0xC0 { 1 } else { 2 };
                pos += 1 + len;
            } else {
                pos += 1;
            }
        }
        ParsedTrack { note_ons }
    }

    #[test]
    fn round_trips_note_on_pitch_velocity_and_tick() {
        let mut track = MidiTrack::new("Lead", 0, gm_program("lead"));
        track.add_note(MidiNote::new(0.0, 1.0, 60, 100));
        track.add_note(MidiNote::new(1.0, 0.5, 64, 90));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mid");
        export_to_midi(&path, vec![track], 120.0).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let (num_tracks, tracks) = parse_midi(&bytes);
        assert_eq!(num_tracks, 1);
        assert_eq!(tracks[0].note_ons, vec![(60, 100, 0), (64, 90, 480)]);
    }

    #[test]
    fn same_input_produces_byte_identical_output() {
        let mut track = MidiTrack::new("Bass", 1, gm_program("bass"));
        track.add_note(MidiNote::new(0.0, 2.0, 36, 100));

        let dir = tempfile::tempdir().unwrap();
        let path_a = dir.path().join("a.mid");
        let path_b = dir.path().join("b.mid");
        export_to_midi(&path_a, vec![track.clone()], 128.0).unwrap();
        export_to_midi(&path_b, vec![track], 128.0).unwrap();

        assert_eq!(std::fs::read(path_a).unwrap(), std::fs::read(path_b).unwrap());
    }

    #[test]
    fn time_signature_denominator_two_quirk_is_preserved() {
        let mut file = MidiFile::new();
        file.set_time_signature(3, 2);
        file.add_track(MidiTrack::new("", 0, 0));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mid");
        file.save(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        // time signature meta event is the first meta after the absent name event
        let idx = bytes.windows(2).position(|w| w == [0xFF, 0x58]).unwrap();
        assert_eq!(bytes[idx + 4], 1);
    }

    #[test]
    fn gm_program_maps_known_instruments() {
        assert_eq!(gm_program("piano"), 0);
        assert_eq!(gm_program("guitar"), 24);
        assert_eq!(gm_program("bass"), 33);
        assert_eq!(gm_program("lead"), 80);
        assert_eq!(gm_program("pad"), 88);
        assert_eq!(gm_program("unknown instrument"), 0);
    }
}
