use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use log::debug;
use serde_jsonlines::JsonLinesWriter;

use crate::{
    ReplayError,
    sink::{TimeValue, VisRecord, VisualizationTarget},
    telemetry::Rgb,
};

/// Writes every visualization call as one [`VisRecord`] JSON object per line.
pub struct JsonLinesTarget<W: Write> {
    writer: JsonLinesWriter<W>,
    written: usize,
}

impl JsonLinesTarget<BufWriter<File>> {
    pub fn create(file: &Path) -> Result<Self, ReplayError> {
        let output = File::create(file).map_err(|e| ReplayError::WriterError { source: e })?;
        debug!("Writing visualization records to {:?}", file);
        Ok(Self::new(BufWriter::new(output)))
    }
}

impl<W: Write> JsonLinesTarget<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: JsonLinesWriter::new(writer),
            written: 0,
        }
    }

    /// Number of records written so far
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write(&mut self, record: &VisRecord) -> Result<(), ReplayError> {
        self.writer
            .write(record)
            .map_err(|e| ReplayError::WriterError { source: e })?;
        self.written += 1;
        Ok(())
    }
}

impl<W: Write> VisualizationTarget for JsonLinesTarget<W> {
    fn set_time(&mut self, timeline: &str, time: TimeValue) -> Result<(), ReplayError> {
        self.write(&VisRecord::SetTime {
            timeline: timeline.to_string(),
            time,
        })
    }

    fn log_points(
        &mut self,
        path: &str,
        points: &[(f32, f32)],
        colors: &[Rgb],
        radius: f32,
    ) -> Result<(), ReplayError> {
        self.write(&VisRecord::Points {
            path: path.to_string(),
            points: points.to_vec(),
            colors: colors.to_vec(),
            radius,
        })
    }

    fn log_line_strip(
        &mut self,
        path: &str,
        points: &[(f32, f32)],
        radius: f32,
        draw_order: f32,
        is_static: bool,
    ) -> Result<(), ReplayError> {
        self.write(&VisRecord::LineStrip {
            path: path.to_string(),
            points: points.to_vec(),
            radius,
            draw_order,
            is_static,
        })
    }

    fn log_scalar(&mut self, path: &str, value: f64) -> Result<(), ReplayError> {
        self.write(&VisRecord::Scalar {
            path: path.to_string(),
            value,
        })
    }

    fn flush(&mut self) -> Result<(), ReplayError> {
        self.writer
            .flush()
            .map_err(|e| ReplayError::WriterError { source: e })
    }
}
