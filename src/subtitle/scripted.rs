//! In-memory [`SubtitleDemuxer`] for reader and boundary tests.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::time::Millis;
use crate::subtitle::reader::{SubtitleDemuxer, SubtitleError, SubtitlePacket, SubtitleStreamInfo};

pub const CUE_MS: Millis = 1_000;

pub struct ScriptedDemuxer {
    packets: Vec<SubtitlePacket>,
    has_stream: bool,
    cursor: usize,
    open: bool,
    seeks: Arc<Mutex<Vec<Millis>>>,
    closes: Arc<Mutex<u32>>,
}

impl ScriptedDemuxer {
    /// One cue per second, each lasting a second
    pub fn cues(texts: &[&str]) -> Self {
        let packets = texts
            .iter()
            .enumerate()
            .map(|(i, text)| SubtitlePacket {
                data: text.as_bytes().to_vec(),
                pts: i as Millis * CUE_MS,
                duration: CUE_MS,
            })
            .collect();
        Self {
            packets,
            has_stream: true,
            cursor: 0,
            open: false,
            seeks: Arc::default(),
            closes: Arc::default(),
        }
    }

    pub fn without_stream(mut self) -> Self {
        self.has_stream = false;
        self
    }

    pub fn seeks(&self) -> Arc<Mutex<Vec<Millis>>> {
        self.seeks.clone()
    }

    pub fn closes(&self) -> Arc<Mutex<u32>> {
        self.closes.clone()
    }
}

impl SubtitleDemuxer for ScriptedDemuxer {
    fn open(&mut self, _path: &Path) -> Result<SubtitleStreamInfo, SubtitleError> {
        if !self.has_stream {
            return Err(SubtitleError::NoStream);
        }
        self.open = true;
        self.cursor = 0;
        Ok(SubtitleStreamInfo {
            index: 0,
            codec_name: "subrip".into(),
            language: Some("eng".into()),
            duration: self.packets.len() as Millis * CUE_MS,
        })
    }

    fn read_packet(&mut self, packet: &mut SubtitlePacket) -> Result<bool, SubtitleError> {
        if !self.open {
            return Err(SubtitleError::NotOpen);
        }
        let Some(next) = self.packets.get(self.cursor) else {
            return Ok(false);
        };
        packet.clone_from(next);
        self.cursor += 1;
        Ok(true)
    }

    fn seek(&mut self, target: Millis) -> Result<(), SubtitleError> {
        if !self.open {
            return Err(SubtitleError::NotOpen);
        }
        self.seeks.lock().push(target);
        self.cursor = self.packets.iter().rposition(|p| p.pts <= target).unwrap_or(0);
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            *self.closes.lock() += 1;
        }
    }
}
