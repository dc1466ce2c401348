/// One work-group of a dispatch, as executed by the [`HostSurface`].
///
/// Lanes run in barrier-delimited steps: [`WorkGroup::step`] runs a closure for every lane and
/// returns only once all of them are done, which is the barrier. Within a step a lane may only
/// write local memory that no other lane reads in the same step.
///
/// [`HostSurface`]: crate::surface::HostSurface
#[derive(Debug)]
pub(crate) struct WorkGroup {
    id: usize,
    size: usize,
    /// Local memory regions, in `i32` words.
    local: Vec<Vec<i32>>,
}

impl WorkGroup {
    pub(crate) fn new(id: usize, size: usize, local_mem_sizes: &[usize]) -> Self {
        let local = local_mem_sizes
            .iter()
            .map(|bytes| vec![0; bytes / std::mem::size_of::<i32>()])
            .collect();
        Self { id, size, local }
    }

    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Global index of `lane`.
    #[inline]
    pub(crate) fn global_id(&self, lane: usize) -> usize {
        self.id * self.size + lane
    }

    /// Local memory region `region`.
    #[inline]
    pub(crate) fn local(&self, region: usize) -> &[i32] {
        &self.local[region]
    }

    /// Run `f(lane, global_id, local)` for every lane, then wait on the group barrier.
    pub(crate) fn step(&mut self, mut f: impl FnMut(usize, usize, &mut [Vec<i32>])) {
        for lane in 0..self.size {
            f(lane, self.global_id(lane), &mut self.local);
        }
    }
}
