pub mod cue;

pub use cue::{CompletionCue, SilentCue, SpeakerSink, Tone, ToneCue, ToneSink};
