//! Provides the training data abstraction consumed by the solvers.
//!
//! Solvers never iterate over a dataset; they ask for records by index. Each gradient worker
//! opens its own handle on the data through [TrainingSet::open_additional][1], so providers that
//! keep a cursor (a file, a stream, a decoding buffer) never have two threads contending on it.
//!
//! [1]: ./trait.TrainingSet.html#tymethod.open_additional
use std::fmt;
use std::sync::Arc;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
/// One training example: an input vector and the ideal output for it.
pub struct TrainingPair {
    /// The input vector.
    pub input: Vec<f64>,
    /// The ideal output vector.
    pub ideal: Vec<f64>,
}

impl TrainingPair {
    /// Create a pair from its vectors.
    pub fn new(input: Vec<f64>, ideal: Vec<f64>) -> TrainingPair {
        TrainingPair { input: input, ideal: ideal }
    }

    /// Create a zeroed pair to be filled by [TrainingSet::get_record][1].
    /// [1]: ./trait.TrainingSet.html#tymethod.get_record
    pub fn with_sizes(input_size: usize, ideal_size: usize) -> TrainingPair {
        TrainingPair {
            input: vec![0f64; input_size],
            ideal: vec![0f64; ideal_size],
        }
    }
}

/// Random-access training data.
pub trait TrainingSet: Send {
    /// Number of records.
    fn count(&self) -> usize;

    /// Length of every input vector.
    fn input_size(&self) -> usize;

    /// Length of every ideal vector.
    fn ideal_size(&self) -> usize;

    /// Copy record `index` into `pair`, which must already have the right sizes.
    fn get_record(&mut self, index: usize, pair: &mut TrainingPair) -> Result<()>;

    /// Open an independent handle over the same records.
    ///
    /// The handle can be used from another thread alongside this one.
    fn open_additional(&self) -> Result<Box<dyn TrainingSet>>;
}

impl fmt::Debug for dyn TrainingSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TrainingSet({} records, {} -> {})", self.count(), self.input_size(), self.ideal_size())
    }
}

#[derive(Debug, Clone)]
/// A training set held in memory.
///
/// Additional handles share the records, so opening one is cheap.
pub struct MemoryTrainingSet {
    pairs: Arc<Vec<TrainingPair>>,
    input_size: usize,
    ideal_size: usize,
}

impl MemoryTrainingSet {
    /// Create a set from pairs. All pairs must have the same sizes.
    pub fn new(pairs: Vec<TrainingPair>) -> Result<MemoryTrainingSet> {
        let (input_size, ideal_size) = match pairs.first() {
            Some(first) => (first.input.len(), first.ideal.len()),
            None => return Err(Error::EmptyTrainingSet),
        };
        for (index, pair) in pairs.iter().enumerate() {
            if pair.input.len() != input_size || pair.ideal.len() != ideal_size {
                return Err(Error::Data(format!("record {} is {}x{}, expected {}x{}",
                                               index, pair.input.len(), pair.ideal.len(), input_size, ideal_size)));
            }
        }
        Ok(MemoryTrainingSet {
            pairs: Arc::new(pairs),
            input_size: input_size,
            ideal_size: ideal_size,
        })
    }

    /// Create a set from parallel slices of inputs and ideals.
    pub fn from_slices(inputs: &[Vec<f64>], ideals: &[Vec<f64>]) -> Result<MemoryTrainingSet> {
        if inputs.len() != ideals.len() {
            return Err(Error::Data(format!("{} inputs but {} ideals", inputs.len(), ideals.len())));
        }
        let pairs = inputs.iter().zip(ideals)
            .map(|(input, ideal)| TrainingPair::new(input.clone(), ideal.clone()))
            .collect();
        MemoryTrainingSet::new(pairs)
    }

    /// The records of the set.
    pub fn pairs(&self) -> &[TrainingPair] {
        &self.pairs
    }
}

impl TrainingSet for MemoryTrainingSet {
    fn count(&self) -> usize {
        self.pairs.len()
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn ideal_size(&self) -> usize {
        self.ideal_size
    }

    fn get_record(&mut self, index: usize, pair: &mut TrainingPair) -> Result<()> {
        let record = self.pairs.get(index).ok_or(Error::RecordOutOfRange { index: index, count: self.pairs.len() })?;
        pair.input.copy_from_slice(&record.input);
        pair.ideal.copy_from_slice(&record.ideal);
        Ok(())
    }

    fn open_additional(&self) -> Result<Box<dyn TrainingSet>> {
        Ok(Box::new(self.clone()))
    }
}

/// Checks that `data` fits a network with the given input and output sizes.
pub fn check_fit(data: &dyn TrainingSet, input_count: usize, output_count: usize) -> Result<()> {
    if data.count() == 0 {
        return Err(Error::EmptyTrainingSet);
    }
    if data.input_size() != input_count {
        return Err(Error::DatasetMismatch { what: "input", network: input_count, dataset: data.input_size() });
    }
    if data.ideal_size() != output_count {
        return Err(Error::DatasetMismatch { what: "ideal", network: output_count, dataset: data.ideal_size() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xor() -> MemoryTrainingSet {
        MemoryTrainingSet::from_slices(
            &[vec![0f64, 0f64], vec![0f64, 1f64], vec![1f64, 0f64], vec![1f64, 1f64]],
            &[vec![0f64], vec![1f64], vec![1f64], vec![0f64]],
        ).unwrap()
    }

    #[test]
    fn get_record_copies_into_the_pair() {
        let mut data = xor();
        let mut pair = TrainingPair::with_sizes(2, 1);
        data.get_record(2, &mut pair).unwrap();
        assert_eq!(pair.input, vec![1f64, 0f64]);
        assert_eq!(pair.ideal, vec![1f64]);
        assert!(matches!(data.get_record(4, &mut pair), Err(Error::RecordOutOfRange { index: 4, count: 4 })));
    }

    #[test]
    fn additional_handles_see_the_same_records() {
        let data = xor();
        let mut other = data.open_additional().unwrap();
        let mut pair = TrainingPair::with_sizes(2, 1);
        other.get_record(3, &mut pair).unwrap();
        assert_eq!(pair, data.pairs()[3]);
        assert_eq!(other.count(), 4);
    }

    #[test]
    fn ragged_records_are_rejected() {
        let pairs = vec![TrainingPair::new(vec![0f64], vec![0f64]), TrainingPair::new(vec![0f64, 1f64], vec![0f64])];
        assert!(matches!(MemoryTrainingSet::new(pairs), Err(Error::Data(_))));
    }

    #[test]
    fn check_fit_names_the_dimension() {
        let data = xor();
        assert!(check_fit(&data, 2, 1).is_ok());
        assert!(matches!(check_fit(&data, 3, 1), Err(Error::DatasetMismatch { what: "input", .. })));
        assert!(matches!(check_fit(&data, 2, 2), Err(Error::DatasetMismatch { what: "ideal", .. })));
    }
}
