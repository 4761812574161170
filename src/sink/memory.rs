use super::{TimeValue, VisRecord, VisualizationTarget};
use crate::ReplayError;
use crate::telemetry::Rgb;

/// Keeps every record in memory, in call order.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    pub records: Vec<VisRecord>,
}

impl VisualizationTarget for RecordingTarget {
    fn set_time(&mut self, timeline: &str, time: TimeValue) -> Result<(), ReplayError> {
        self.records.push(VisRecord::SetTime {
            timeline: timeline.to_string(),
            time,
        });
        Ok(())
    }

    fn log_points(
        &mut self,
        path: &str,
        points: &[(f32, f32)],
        colors: &[Rgb],
        radius: f32,
    ) -> Result<(), ReplayError> {
        self.records.push(VisRecord::Points {
            path: path.to_string(),
            points: points.to_vec(),
            colors: colors.to_vec(),
            radius,
        });
        Ok(())
    }

    fn log_line_strip(
        &mut self,
        path: &str,
        points: &[(f32, f32)],
        radius: f32,
        draw_order: f32,
        is_static: bool,
    ) -> Result<(), ReplayError> {
        self.records.push(VisRecord::LineStrip {
            path: path.to_string(),
            points: points.to_vec(),
            radius,
            draw_order,
            is_static,
        });
        Ok(())
    }

    fn log_scalar(&mut self, path: &str, value: f64) -> Result<(), ReplayError> {
        self.records.push(VisRecord::Scalar {
            path: path.to_string(),
            value,
        });
        Ok(())
    }
}

/// Discards records, only counting them. Used for dry runs.
#[derive(Debug, Default)]
pub struct CountingTarget {
    pub records: usize,
}

impl VisualizationTarget for CountingTarget {
    fn set_time(&mut self, _: &str, _: TimeValue) -> Result<(), ReplayError> {
        self.records += 1;
        Ok(())
    }

    fn log_points(
        &mut self,
        _: &str,
        _: &[(f32, f32)],
        _: &[Rgb],
        _: f32,
    ) -> Result<(), ReplayError> {
        self.records += 1;
        Ok(())
    }

    fn log_line_strip(
        &mut self,
        _: &str,
        _: &[(f32, f32)],
        _: f32,
        _: f32,
        _: bool,
    ) -> Result<(), ReplayError> {
        self.records += 1;
        Ok(())
    }

    fn log_scalar(&mut self, _: &str, _: f64) -> Result<(), ReplayError> {
        self.records += 1;
        Ok(())
    }
}
