//! Owned sample lines consumed by the lifting engine.

/// Numeric domain of a [`LineBuf`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    I32,
    I64,
    F32,
    /// Untyped bytes, eight per sample.
    Raw,
}

#[derive(Debug, Clone, PartialEq)]
enum Samples {
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    Raw(Vec<u8>),
}

/// A line of samples with `pre_size` slack samples ahead of the payload and
/// one behind it. The slack holds the edge extension written before each
/// horizontal lifting step.
#[derive(Debug, Clone, PartialEq)]
pub struct LineBuf {
    samples: Samples,
    pre_size: usize,
    width: usize,
}

impl LineBuf {
    pub fn new(sample_type: SampleType, width: usize) -> Self {
        Self::with_pre_size(sample_type, width, 1)
    }

    /// A zeroed line; `pre_size` is raised to 1 when smaller.
    pub fn with_pre_size(sample_type: SampleType, width: usize, pre_size: usize) -> Self {
        let pre_size = pre_size.max(1);
        let len = pre_size + width + 1;
        let samples = match sample_type {
            SampleType::I32 => Samples::I32(vec![0; len]),
            SampleType::I64 => Samples::I64(vec![0; len]),
            SampleType::F32 => Samples::F32(vec![0.0; len]),
            SampleType::Raw => Samples::Raw(vec![0; len * 8]),
        };
        Self {
            samples,
            pre_size,
            width,
        }
    }

    /// A line holding a copy of `values`.
    pub fn from_slice<T: LineSample>(values: &[T]) -> Self {
        let mut line = Self::new(T::TYPE, values.len());
        if let Some(payload) = line.payload_mut::<T>() {
            payload.copy_from_slice(values);
        }
        line
    }

    pub fn sample_type(&self) -> SampleType {
        match self.samples {
            Samples::I32(_) => SampleType::I32,
            Samples::I64(_) => SampleType::I64,
            Samples::F32(_) => SampleType::F32,
            Samples::Raw(_) => SampleType::Raw,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn pre_size(&self) -> usize {
        self.pre_size
    }

    /// The payload, if the line holds samples of type `T`.
    pub fn payload<T: LineSample>(&self) -> Option<&[T]> {
        let range = self.pre_size..self.pre_size + self.width;
        T::storage(self).map(|samples| &samples[range])
    }

    pub fn payload_mut<T: LineSample>(&mut self) -> Option<&mut [T]> {
        let range = self.pre_size..self.pre_size + self.width;
        T::storage_mut(self).map(|samples| &mut samples[range])
    }

    pub fn raw(&self) -> Option<&[u8]> {
        match &self.samples {
            Samples::Raw(bytes) => Some(&bytes[self.pre_size * 8..(self.pre_size + self.width) * 8]),
            _ => None,
        }
    }

    pub fn raw_mut(&mut self) -> Option<&mut [u8]> {
        let range = self.pre_size * 8..(self.pre_size + self.width) * 8;
        match &mut self.samples {
            Samples::Raw(bytes) => Some(&mut bytes[range]),
            _ => None,
        }
    }

    pub(crate) fn lane<T: LineSample>(&mut self) -> Option<Lane<'_, T>> {
        let pre = self.pre_size;
        T::storage_mut(self).map(|buf| Lane { buf, pre })
    }
}

/// Sample types the lifting engine operates on.
pub trait LineSample: Copy + Default + sealed::Sealed {
    const TYPE: SampleType;

    #[doc(hidden)]
    fn storage(line: &LineBuf) -> Option<&[Self]>;
    #[doc(hidden)]
    fn storage_mut(line: &mut LineBuf) -> Option<&mut [Self]>;
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
    impl Sealed for f32 {}
}

macro_rules! impl_line_sample {
    ($ty:ty, $variant:ident) => {
        impl LineSample for $ty {
            const TYPE: SampleType = SampleType::$variant;

            fn storage(line: &LineBuf) -> Option<&[Self]> {
                match &line.samples {
                    Samples::$variant(samples) => Some(samples),
                    _ => None,
                }
            }

            fn storage_mut(line: &mut LineBuf) -> Option<&mut [Self]> {
                match &mut line.samples {
                    Samples::$variant(samples) => Some(samples),
                    _ => None,
                }
            }
        }
    };
}

impl_line_sample!(i32, I32);
impl_line_sample!(i64, I64);
impl_line_sample!(f32, F32);

/// Mutable view of a whole line, slack included; `pre` is the payload
/// offset.
pub(crate) struct Lane<'a, T> {
    pub(crate) buf: &'a mut [T],
    pub(crate) pre: usize,
}

impl<T: Copy> Lane<'_, T> {
    /// Replicates the first and last of `len` payload samples into the
    /// slack on either side.
    pub(crate) fn extend(&mut self, len: usize) {
        self.buf[self.pre - 1] = self.buf[self.pre];
        self.buf[self.pre + len] = self.buf[self.pre + len - 1];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_access_checks_type() {
        let mut line = LineBuf::new(SampleType::I64, 4);
        assert!(line.payload::<i32>().is_none());
        line.payload_mut::<i64>().unwrap()[3] = -7;
        assert_eq!(line.payload::<i64>().unwrap(), &[0, 0, 0, -7]);
        assert!(line.raw().is_none());
    }

    #[test]
    fn test_slack_and_extension() {
        let mut line = LineBuf::with_pre_size(SampleType::I32, 3, 0);
        assert_eq!(line.pre_size(), 1);
        line.payload_mut::<i32>().unwrap().copy_from_slice(&[4, 5, 6]);
        let mut lane = line.lane::<i32>().unwrap();
        lane.extend(3);
        assert_eq!(&*lane.buf, &[4, 4, 5, 6, 6]);
    }

    #[test]
    fn test_raw_line() {
        let mut line = LineBuf::new(SampleType::Raw, 2);
        assert_eq!(line.sample_type(), SampleType::Raw);
        line.raw_mut().unwrap()[..8].copy_from_slice(&1.5f64.to_be_bytes());
        assert_eq!(line.raw().unwrap().len(), 16);
        assert!(line.payload::<f32>().is_none());
    }

    #[test]
    fn test_from_slice() {
        let line = LineBuf::from_slice(&[1.0f32, -2.0]);
        assert_eq!(line.sample_type(), SampleType::F32);
        assert_eq!(line.payload::<f32>().unwrap(), &[1.0, -2.0]);
    }
}
