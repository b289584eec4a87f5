//! GPU-accelerated FPFH backend

use std::time::Instant;

use pointfeat_algorithms::{
    validate_aggregation, ExecutionBackend, NeighborTable, ParallelBackend, SpfTable,
};
use pointfeat_core::{
    Dtype, Error, FeatureMatrix, Histogram, NormalPoint3, PointCloud, Real, Result, SearchPolicy,
    COINCIDENT_DISTANCE, HISTOGRAM_DIM,
};

use crate::device::{dispatch_dimensions, GpuContext};

const SPF_SHADER: &str = include_str!("shaders/spf.wgsl");
const AGGREGATE_SHADER: &str = include_str!("shaders/aggregate.wgsl");

/// Shader uniform shared by both passes
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct PassParams {
    num_items: u32,
    row_stride: u32,
    epsilon: f32,
    _padding: u32,
}

/// FPFH backend running both descriptor passes as compute shaders
///
/// The neighbor table is built on the CPU with rayon and uploaded in CSR form.
/// Shaders compute in single precision whatever `T` is; results are widened
/// back to `T` on readback.
pub struct AcceleratedBackend {
    context: GpuContext,
    ordinal: usize,
    search: ParallelBackend,
}

impl std::fmt::Debug for AcceleratedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcceleratedBackend")
            .field("ordinal", &self.ordinal)
            .field("adapter", &self.context.adapter_name())
            .finish()
    }
}

impl AcceleratedBackend {
    /// Open the `ordinal`-th GPU adapter, blocking until the device is ready
    pub fn new(ordinal: usize) -> Result<Self> {
        let context = pollster::block_on(GpuContext::with_ordinal(ordinal))?;
        Ok(Self::from_context(context, ordinal))
    }

    /// Wrap an existing context
    pub fn from_context(context: GpuContext, ordinal: usize) -> Self {
        Self {
            context,
            ordinal,
            search: ParallelBackend::new(),
        }
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    fn params(&self, num_items: usize, row_stride: u32) -> Result<PassParams> {
        let num_items = u32::try_from(num_items)
            .map_err(|_| Error::Gpu(format!("{} items exceed the u32 index range", num_items)))?;
        Ok(PassParams {
            num_items,
            row_stride,
            epsilon: COINCIDENT_DISTANCE as f32,
            _padding: 0,
        })
    }

    fn storage_buffer<P: bytemuck::Pod>(&self, label: &str, data: &[P]) -> Result<wgpu::Buffer> {
        self.context
            .check_binding_size(label, std::mem::size_of_val(data) as u64)?;
        Ok(self
            .context
            .create_buffer_init(label, data, wgpu::BufferUsages::STORAGE))
    }

    fn output_buffer(&self, label: &str, len: usize) -> Result<wgpu::Buffer> {
        let size = (len * std::mem::size_of::<f32>()) as u64;
        self.context.check_binding_size(label, size)?;
        Ok(self.context.create_buffer(
            label,
            size,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        ))
    }

    /// Run `source`'s `main` over `num_items` invocations with `buffers`
    /// bound in order, followed by the params uniform
    fn dispatch(
        &self,
        label: &str,
        source: &str,
        buffers: &[&wgpu::Buffer],
        num_items: usize,
    ) -> Result<()> {
        let (x, y, row_stride) = dispatch_dimensions(num_items);
        let params = self.params(num_items, row_stride)?;
        let params_buffer =
            self.context
                .create_buffer_init("Pass Params", &[params], wgpu::BufferUsages::UNIFORM);

        let shader = self.context.create_shader_module(label, source);
        let pipeline = self.context.create_compute_pipeline(label, &shader, "main");

        let mut entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: buffers.len() as u32,
            resource: params_buffer.as_entire_binding(),
        });
        let bind_group =
            self.context
                .create_bind_group(label, &pipeline.get_bind_group_layout(0), &entries);

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(x, y, 1);
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn csr_buffers<T: Real>(
        &self,
        neighbors: &NeighborTable<T>,
    ) -> Result<(wgpu::Buffer, wgpu::Buffer)> {
        let offsets = to_u32(neighbors.offsets())?;
        let indices = to_u32(neighbors.indices())?;
        Ok((
            self.storage_buffer("Neighbor Offsets", &offsets)?,
            self.storage_buffer("Neighbor Indices", &indices)?,
        ))
    }
}

fn to_u32(values: &[usize]) -> Result<Vec<u32>> {
    values
        .iter()
        .map(|&v| {
            u32::try_from(v).map_err(|_| Error::Gpu(format!("index {} exceeds the u32 range", v)))
        })
        .collect()
}

fn to_vec4<T: Real>(x: T, y: T, z: T) -> [f32; 4] {
    [x.as_f64() as f32, y.as_f64() as f32, z.as_f64() as f32, 0.0]
}

fn into_histograms<T: Real>(values: &[f32]) -> Vec<Histogram<T>> {
    values
        .chunks_exact(HISTOGRAM_DIM)
        .map(|chunk| {
            let mut histogram = [T::zero(); HISTOGRAM_DIM];
            for (out, &value) in histogram.iter_mut().zip(chunk) {
                *out = T::cast_f64(value as f64);
            }
            histogram
        })
        .collect()
}

impl<T: Real> ExecutionBackend<T> for AcceleratedBackend {
    fn name(&self) -> String {
        format!("gpu:{}", self.ordinal)
    }

    fn build_neighbor_table(
        &self,
        cloud: &PointCloud<NormalPoint3<T>>,
        policy: &SearchPolicy<T>,
    ) -> Result<NeighborTable<T>> {
        self.search.build_neighbor_table(cloud, policy)
    }

    fn run_spf_pass(
        &self,
        cloud: &PointCloud<NormalPoint3<T>>,
        neighbors: &NeighborTable<T>,
    ) -> Result<SpfTable<T>> {
        if cloud.is_empty() {
            return SpfTable::from_device_pass(Vec::new(), neighbors.len());
        }

        if T::DTYPE != Dtype::Float32 {
            log::warn!("GPU backend computes in float32, {} input is rounded", T::DTYPE);
        }

        let start = Instant::now();
        let positions: Vec<[f32; 4]> = cloud
            .iter()
            .map(|p| to_vec4(p.position.x, p.position.y, p.position.z))
            .collect();
        let normals: Vec<[f32; 4]> = cloud
            .iter()
            .map(|p| to_vec4(p.normal.x, p.normal.y, p.normal.z))
            .collect();

        let positions_buffer = self.storage_buffer("Positions", &positions)?;
        let normals_buffer = self.storage_buffer("Normals", &normals)?;
        let (offsets_buffer, indices_buffer) = self.csr_buffers(neighbors)?;
        let histograms_buffer = self.output_buffer("SPF Histograms", cloud.len() * HISTOGRAM_DIM)?;

        self.dispatch(
            "SPF Pass",
            SPF_SHADER,
            &[
                &positions_buffer,
                &normals_buffer,
                &offsets_buffer,
                &indices_buffer,
                &histograms_buffer,
            ],
            cloud.len(),
        )?;

        let values: Vec<f32> = pollster::block_on(self.context.read_buffer(&histograms_buffer))?;
        log::debug!("GPU SPF pass over {} points: {:?}", cloud.len(), start.elapsed());

        SpfTable::from_device_pass(into_histograms(&values), neighbors.len())
    }

    fn run_aggregation_pass(
        &self,
        neighbors: &NeighborTable<T>,
        spf: &SpfTable<T>,
        rows: &[usize],
    ) -> Result<FeatureMatrix<T>> {
        validate_aggregation(neighbors, spf, rows)?;
        if rows.is_empty() || spf.is_empty() {
            return Ok(FeatureMatrix::zeros(rows.len()));
        }

        let start = Instant::now();
        let distances: Vec<f32> = neighbors
            .distances()
            .iter()
            .map(|d| d.as_f64() as f32)
            .collect();
        let spf_values: Vec<f32> = spf
            .histograms()
            .iter()
            .flat_map(|h| h.iter().map(|v| v.as_f64() as f32))
            .collect();
        let row_indices = to_u32(rows)?;

        let (offsets_buffer, indices_buffer) = self.csr_buffers(neighbors)?;
        let distances_buffer = self.storage_buffer("Neighbor Distances", &distances)?;
        let spf_buffer = self.storage_buffer("SPF Table", &spf_values)?;
        let rows_buffer = self.storage_buffer("Requested Rows", &row_indices)?;
        let features_buffer = self.output_buffer("FPFH Features", rows.len() * HISTOGRAM_DIM)?;

        self.dispatch(
            "Aggregation Pass",
            AGGREGATE_SHADER,
            &[
                &offsets_buffer,
                &indices_buffer,
                &distances_buffer,
                &spf_buffer,
                &rows_buffer,
                &features_buffer,
            ],
            rows.len(),
        )?;

        let values: Vec<f32> = pollster::block_on(self.context.read_buffer(&features_buffer))?;
        log::debug!("GPU aggregation pass over {} rows: {:?}", rows.len(), start.elapsed());

        Ok(FeatureMatrix::from_rows(into_histograms(&values)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pointfeat_algorithms::SequentialBackend;
    use pointfeat_core::{NormalPoint3f, Point3f, Vector3f};

    fn grid_cloud(side: usize) -> PointCloud<NormalPoint3f> {
        (0..side * side)
            .map(|i| {
                NormalPoint3f::new(
                    Point3f::new((i % side) as f32 * 0.1, (i / side) as f32 * 0.1, 0.0),
                    Vector3f::z(),
                )
            })
            .collect()
    }

    #[test]
    fn test_histogram_conversion() {
        let values: Vec<f32> = (0..2 * HISTOGRAM_DIM).map(|v| v as f32).collect();
        let histograms = into_histograms::<f64>(&values);
        assert_eq!(histograms.len(), 2);
        assert_eq!(histograms[1][0], HISTOGRAM_DIM as f64);
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_matches_sequential_backend() {
        let backend = AcceleratedBackend::new(0).unwrap();
        let cloud = grid_cloud(16);
        let policy = SearchPolicy::radius(0.15);
        let gpu = backend.compute(&cloud, &policy, None).unwrap();
        let cpu = SequentialBackend.compute(&cloud, &policy, None).unwrap();
        assert_eq!(gpu.nrows(), cpu.nrows());
        for (a, b) in gpu.rows().iter().zip(cpu.rows()) {
            for (&x, &y) in a.iter().zip(b.iter()) {
                assert_relative_eq!(x, y, epsilon = 1e-3, max_relative = 1e-4);
            }
        }
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_duplicate_point_matches_both_precisions() {
        let backend = AcceleratedBackend::new(0).unwrap();
        let positions = [
            Point3f::new(0.3, -0.2, 1.0),
            Point3f::new(0.3, -0.2, 1.0),
            Point3f::new(0.4, -0.2, 1.0),
        ];
        let cloud =
            PointCloud::from_positions_and_normals(&positions, &[Vector3f::z(); 3]).unwrap();
        let policy = SearchPolicy::radius(0.5);

        let gpu = backend.compute(&cloud, &policy, None).unwrap();
        let single = SequentialBackend.compute(&cloud, &policy, None).unwrap();
        let double = SequentialBackend
            .compute(&cloud.cast::<f64>(), &policy.cast::<f64>(), None)
            .unwrap();
        for ((a, b), c) in gpu.rows().iter().zip(single.rows()).zip(double.rows()) {
            for ((&x, &y), &z) in a.iter().zip(b.iter()).zip(c.iter()) {
                assert_relative_eq!(x, y, epsilon = 1e-3, max_relative = 1e-4);
                assert_relative_eq!(x as f64, z, epsilon = 1e-3, max_relative = 1e-4);
            }
        }
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_subset_rows_and_double_precision() {
        let backend = AcceleratedBackend::new(0).unwrap();
        let cloud = grid_cloud(8).cast::<f64>();
        let policy = SearchPolicy::knn(5);
        let subset = backend.compute(&cloud, &policy, Some(&[9, 0])).unwrap();
        let full = backend.compute(&cloud, &policy, None).unwrap();
        assert_eq!(subset.nrows(), 2);
        assert_eq!(subset.row(0), full.row(9));
        assert_eq!(subset.row(1), full.row(0));
    }
}
