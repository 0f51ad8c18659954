//! Random hyperplane families for bucketed random projection.
//!
//! Each hash table holds `H` direction vectors. A vector `v` is projected
//! onto every direction and the projection is discretized by the shared
//! bucket length `L`:
//!
//! ```text
//! h_i(v) = floor(dot(v, direction_i) / L)
//! ```
//!
//! The `H` codes of one table form that table's composite [`BucketKey`].

use ndarray::{Array2, ArrayView1};
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{LshError, Result};
use crate::vector::Vector;

/// Configuration parameters for the hyperplane family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LshParams {
    /// Width of the discretization interval along each direction.
    pub bucket_length: f32,
    /// Hyperplanes per hash table (H).
    pub num_hyperplanes: usize,
    /// Independent hash tables (T).
    pub num_tables: usize,
    /// RNG seed for drawing directions.
    pub seed: u64,
}

impl Default for LshParams {
    fn default() -> Self {
        Self {
            bucket_length: 2.0,
            num_hyperplanes: 1,
            num_tables: 3,
            seed: 42,
        }
    }
}

impl LshParams {
    pub fn new(bucket_length: f32, num_hyperplanes: usize, num_tables: usize, seed: u64) -> Self {
        Self {
            bucket_length,
            num_hyperplanes,
            num_tables,
            seed,
        }
    }

    /// Check the parameters for a corpus of the given dimensionality.
    pub fn validate(&self, dimension: usize) -> Result<()> {
        if dimension == 0 {
            return Err(LshError::configuration("dimension must be positive"));
        }
        validate_bucket_length(self.bucket_length)?;
        if self.num_hyperplanes == 0 {
            return Err(LshError::configuration(
                "num_hyperplanes must be positive",
            ));
        }
        if self.num_tables == 0 {
            return Err(LshError::configuration("num_tables must be positive"));
        }
        Ok(())
    }
}

fn validate_bucket_length(bucket_length: f32) -> Result<()> {
    if !bucket_length.is_finite() || bucket_length <= 0.0 {
        return Err(LshError::configuration(format!(
            "bucket_length must be positive and finite, got {}",
            bucket_length
        )));
    }
    Ok(())
}

/// Composite hash key of one table: the tuple of per-hyperplane bucket codes.
///
/// Keys compare as whole tuples, so distinct code tuples never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey(Box<[i64]>);

impl BucketKey {
    pub fn new(codes: impl Into<Box<[i64]>>) -> Self {
        Self(codes.into())
    }

    /// The per-hyperplane bucket codes.
    pub fn codes(&self) -> &[i64] {
        &self.0
    }
}

/// One hash table: `H` directions stored row-wise in an `H x D` matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct HashTable {
    directions: Array2<f32>,
}

impl HashTable {
    fn new(directions: Array2<f32>) -> Self {
        Self { directions }
    }

    pub fn num_hyperplanes(&self) -> usize {
        self.directions.nrows()
    }

    /// Direction of the `i`-th hyperplane.
    pub fn direction(&self, i: usize) -> ArrayView1<'_, f32> {
        self.directions.row(i)
    }

    /// Bucket codes of `vector` in this table. The caller guarantees the
    /// vector has the table's dimensionality.
    pub fn hash(&self, vector: &[f32], bucket_length: f32) -> BucketKey {
        let projections = self.directions.dot(&ArrayView1::from(vector));
        BucketKey(
            projections
                .iter()
                .map(|p| (p / bucket_length).floor() as i64)
                .collect(),
        )
    }
}

/// `T` independent hash tables sharing one bucket length.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperplaneFamily {
    tables: Vec<HashTable>,
    bucket_length: f32,
    dimension: usize,
}

impl HyperplaneFamily {
    /// Draw `T * H` random unit directions of the given dimensionality.
    ///
    /// Components are sampled from the standard normal distribution with a
    /// `StdRng` seeded from `params.seed`, then each direction is scaled to
    /// unit length. The same parameters always yield the same family.
    pub fn fit(dimension: usize, params: &LshParams) -> Result<Self> {
        params.validate(dimension)?;

        let mut rng = StdRng::seed_from_u64(params.seed);
        let tables = (0..params.num_tables)
            .map(|_| {
                let mut directions: Array2<f32> = Array2::random_using(
                    (params.num_hyperplanes, dimension),
                    StandardNormal,
                    &mut rng,
                );
                for mut row in directions.rows_mut() {
                    let norm = row.dot(&row).sqrt();
                    if norm > 0.0 {
                        row.mapv_inplace(|x| x / norm);
                    }
                }
                HashTable::new(directions)
            })
            .collect();

        Ok(Self {
            tables,
            bucket_length: params.bucket_length,
            dimension,
        })
    }

    /// Build a family from explicit directions, one inner list per table.
    ///
    /// Directions are used as given (no normalization). Every table must
    /// hold the same number of directions and every direction must share
    /// one non-zero dimensionality.
    pub fn from_directions(bucket_length: f32, tables: Vec<Vec<Vector>>) -> Result<Self> {
        validate_bucket_length(bucket_length)?;

        let num_hyperplanes = tables
            .first()
            .map(|t| t.len())
            .ok_or_else(|| LshError::configuration("num_tables must be positive"))?;
        if num_hyperplanes == 0 {
            return Err(LshError::configuration("num_hyperplanes must be positive"));
        }
        let dimension = tables[0][0].dimension();
        if dimension == 0 {
            return Err(LshError::configuration("dimension must be positive"));
        }

        let mut built = Vec::with_capacity(tables.len());
        for (t, table) in tables.into_iter().enumerate() {
            if table.len() != num_hyperplanes {
                return Err(LshError::configuration(format!(
                    "table {} has {} hyperplanes, expected {}",
                    t,
                    table.len(),
                    num_hyperplanes
                )));
            }
            let mut flat = Vec::with_capacity(num_hyperplanes * dimension);
            for direction in &table {
                direction.validate()?;
                if direction.dimension() != dimension {
                    return Err(LshError::DimensionMismatch {
                        expected: dimension,
                        actual: direction.dimension(),
                    });
                }
                flat.extend_from_slice(direction.as_slice());
            }
            let directions = Array2::from_shape_vec((num_hyperplanes, dimension), flat)
                .map_err(|e| LshError::configuration(e.to_string()))?;
            built.push(HashTable::new(directions));
        }

        Ok(Self {
            tables: built,
            bucket_length,
            dimension,
        })
    }

    pub fn tables(&self) -> &[HashTable] {
        &self.tables
    }

    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    pub fn num_hyperplanes(&self) -> usize {
        self.tables.first().map_or(0, HashTable::num_hyperplanes)
    }

    pub fn bucket_length(&self) -> f32 {
        self.bucket_length
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Composite key of `vector` in every table, in table order.
    pub fn hash(&self, vector: &[f32]) -> Result<Vec<BucketKey>> {
        if vector.len() != self.dimension {
            return Err(LshError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(self
            .tables
            .iter()
            .map(|table| table.hash(vector, self.bucket_length))
            .collect())
    }
}
