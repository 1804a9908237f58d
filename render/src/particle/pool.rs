//! Pooled particle buffers.
//!
//! Emitters draw their storage from a shared pool at first emission. A
//! backing is either a GPU SSBO (compute-capable contexts) or a flat CPU
//! record array; the choice is made once per buffer and sticks. Disposed
//! buffers return to the pool and are recycled for emitters of the same
//! capacity and kind.

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;
use crate::caps::Capabilities;
use crate::error::RenderError;
use crate::particle::components::ParticleEvent;
use crate::particle::record::{Particle, PARTICLE_STRIDE_BYTES};
use nalgebra_glm::Vec3;
use slotmap::SlotMap;
use std::rc::Rc;

slotmap::new_key_type! {
    /// Pool slot of one particle buffer backing.
    pub struct BufferKey;
}

/// Hard cap on death/collision events carried per frame per buffer; the
/// GPU event buffer is sized for this and the CPU path honours the same
/// limit so the two stay in step.
pub const MAX_EVENTS: usize = 1024;

/// Floats per GPU event record: position+speed, velocity+pad, color.
const EVENT_FLOATS: usize = 12;
/// Two u32 counters (death, collision) lead the event buffer.
const EVENT_HEADER_BYTES: usize = 8;

/// Runs `f` with `buffer` on the generic SSBO binding point, then puts
/// the previous binding back, so pool traffic never leaks binding state.
fn with_ssbo_binding<R>(gl_: &Gl, buffer: GLuint, f: impl FnOnce() -> R) -> R {
    unsafe {
        let mut prev: GLint = 0;
        gl_.GetIntegerv(gl::SHADER_STORAGE_BUFFER_BINDING, &mut prev);
        gl_.BindBuffer(gl::SHADER_STORAGE_BUFFER, buffer);
        let result = f();
        gl_.BindBuffer(gl::SHADER_STORAGE_BUFFER, prev as GLuint);
        result
    }
}

/// Per-buffer draw resources, built lazily by the render system (VAO with
/// instance attributes over the records plus the base geometry).
pub struct ParticleDraw {
    pub vao: GLuint,
    pub base_vbo: GLuint,
    pub base_vertex_count: GLsizei,
    /// Indexed mesh mode when set (count, ebo handled through the VAO).
    pub base_index_count: Option<GLsizei>,
    /// Discriminates which render mode / base mesh the VAO was built
    /// for, so a mode change rebuilds it.
    pub tag: u64,
    pub gl: Rc<Gl>,
}

impl Drop for ParticleDraw {
    fn drop(&mut self) {
        unsafe {
            self.gl.DeleteVertexArrays(1, &self.vao);
            if self.base_vbo != 0 {
                self.gl.DeleteBuffers(1, &self.base_vbo);
            }
        }
    }
}

impl std::fmt::Debug for ParticleDraw {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ParticleDraw")
            .field("vao", &self.vao)
            .field("tag", &self.tag)
            .finish()
    }
}

/// CPU fallback storage: the flat record array plus a dynamic VBO mirror
/// uploaded at draw time.
#[derive(Debug)]
pub struct CpuParticles {
    pub records: Vec<Particle>,
    pub draw: Option<ParticleDraw>,
    /// Dynamic VBO the records are uploaded into each frame.
    pub stream_vbo: Option<GLuint>,
}

impl CpuParticles {
    fn new(capacity: usize) -> CpuParticles {
        CpuParticles {
            records: vec![Particle::dead(); capacity],
            draw: None,
            stream_vbo: None,
        }
    }

    pub fn alive(&self) -> usize {
        self.records.iter().filter(|p| p.is_alive()).count()
    }

    fn reset(&mut self) {
        for record in &mut self.records {
            *record = Particle::dead();
        }
    }
}

/// GPU storage: the record SSBO, a staging buffer for emitted records and
/// the event buffer the compute passes append into.
pub struct GpuParticles {
    gl: Rc<Gl>,
    pub capacity: usize,
    pub ssbo: GLuint,
    pub staging: GLuint,
    /// Packed per-frame emitter parameters for the update pass.
    pub params: GLuint,
    pub events: GLuint,
    pub draw: Option<ParticleDraw>,
}

impl GpuParticles {
    fn new(gl_: &Rc<Gl>, capacity: usize) -> Result<GpuParticles, RenderError> {
        let mut ssbo = 0;
        let mut staging = 0;
        let mut params = 0;
        let mut events = 0;
        unsafe {
            gl_.GenBuffers(1, &mut ssbo);
            gl_.GenBuffers(1, &mut staging);
            gl_.GenBuffers(1, &mut params);
            gl_.GenBuffers(1, &mut events);
            if ssbo == 0 || staging == 0 || params == 0 || events == 0 {
                return Err(RenderError::BufferInit(
                    "could not allocate particle buffer objects".into(),
                ));
            }

            let zero = vec![0u8; capacity * PARTICLE_STRIDE_BYTES];
            with_ssbo_binding(gl_, ssbo, || {
                gl_.BufferData(
                    gl::SHADER_STORAGE_BUFFER,
                    zero.len() as GLsizeiptr,
                    zero.as_ptr() as *const GLvoid,
                    gl::DYNAMIC_DRAW,
                )
            });
            with_ssbo_binding(gl_, staging, || {
                gl_.BufferData(
                    gl::SHADER_STORAGE_BUFFER,
                    zero.len() as GLsizeiptr,
                    std::ptr::null(),
                    gl::STREAM_DRAW,
                )
            });
            let event_bytes = EVENT_HEADER_BYTES + 2 * MAX_EVENTS * EVENT_FLOATS * 4;
            let zero_events = vec![0u8; event_bytes];
            with_ssbo_binding(gl_, events, || {
                gl_.BufferData(
                    gl::SHADER_STORAGE_BUFFER,
                    zero_events.len() as GLsizeiptr,
                    zero_events.as_ptr() as *const GLvoid,
                    gl::DYNAMIC_READ,
                )
            });
        }
        Ok(GpuParticles {
            gl: Rc::clone(gl_),
            capacity,
            ssbo,
            staging,
            params,
            events,
            draw: None,
        })
    }

    fn reset(&mut self) {
        let zero = vec![0u8; self.capacity * PARTICLE_STRIDE_BYTES];
        with_ssbo_binding(&self.gl, self.ssbo, || unsafe {
            self.gl.BufferSubData(
                gl::SHADER_STORAGE_BUFFER,
                0,
                zero.len() as GLsizeiptr,
                zero.as_ptr() as *const GLvoid,
            );
        });
        self.clear_events();
    }

    /// Uploads the packed emitter parameters for this frame's update
    /// dispatch.
    pub fn upload_params(&self, floats: &[f32]) {
        with_ssbo_binding(&self.gl, self.params, || unsafe {
            self.gl.BufferData(
                gl::SHADER_STORAGE_BUFFER,
                (floats.len().max(1) * 4) as GLsizeiptr,
                floats.as_ptr() as *const GLvoid,
                gl::STREAM_DRAW,
            );
        });
    }

    /// Uploads freshly emitted records into the staging buffer; the emit
    /// compute pass copies them into dead slots.
    pub fn upload_staging(&self, records: &[Particle]) {
        if records.is_empty() {
            return;
        }
        with_ssbo_binding(&self.gl, self.staging, || unsafe {
            self.gl.BufferSubData(
                gl::SHADER_STORAGE_BUFFER,
                0,
                std::mem::size_of_val(records) as GLsizeiptr,
                records.as_ptr() as *const GLvoid,
            );
        });
    }

    /// Reads the death/collision events appended by the update pass and
    /// resets the counters. Called once per frame after the compute
    /// dispatch has been barriered.
    pub fn read_back_events(&self) -> (Vec<ParticleEvent>, Vec<ParticleEvent>) {
        let (death_events, collision_events) = with_ssbo_binding(&self.gl, self.events, || {
            let mut header = [0u32; 2];
            unsafe {
                self.gl.GetBufferSubData(
                    gl::SHADER_STORAGE_BUFFER,
                    0,
                    EVENT_HEADER_BYTES as GLsizeiptr,
                    header.as_mut_ptr() as *mut GLvoid,
                );
            }
            let deaths = (header[0] as usize).min(MAX_EVENTS);
            let collisions = (header[1] as usize).min(MAX_EVENTS);

            let read_events = |index: usize, count: usize| -> Vec<ParticleEvent> {
                if count == 0 {
                    return Vec::new();
                }
                let mut floats = vec![0f32; count * EVENT_FLOATS];
                let offset = EVENT_HEADER_BYTES + index * MAX_EVENTS * EVENT_FLOATS * 4;
                unsafe {
                    self.gl.GetBufferSubData(
                        gl::SHADER_STORAGE_BUFFER,
                        offset as GLintptr,
                        (floats.len() * 4) as GLsizeiptr,
                        floats.as_mut_ptr() as *mut GLvoid,
                    );
                }
                floats
                    .chunks_exact(EVENT_FLOATS)
                    .map(|chunk| ParticleEvent {
                        position: Vec3::new(chunk[0], chunk[1], chunk[2]),
                        speed: chunk[3],
                        velocity: Vec3::new(chunk[4], chunk[5], chunk[6]),
                        color: [chunk[8], chunk[9], chunk[10], chunk[11]],
                    })
                    .collect()
            };
            (read_events(0, deaths), read_events(1, collisions))
        });
        self.clear_events();
        (death_events, collision_events)
    }

    fn clear_events(&self) {
        let zero = [0u32; 2];
        with_ssbo_binding(&self.gl, self.events, || unsafe {
            self.gl.BufferSubData(
                gl::SHADER_STORAGE_BUFFER,
                0,
                EVENT_HEADER_BYTES as GLsizeiptr,
                zero.as_ptr() as *const GLvoid,
            );
        });
    }
}

impl Drop for GpuParticles {
    fn drop(&mut self) {
        unsafe {
            self.gl.DeleteBuffers(1, &self.ssbo);
            self.gl.DeleteBuffers(1, &self.staging);
            self.gl.DeleteBuffers(1, &self.params);
            self.gl.DeleteBuffers(1, &self.events);
        }
    }
}

impl std::fmt::Debug for GpuParticles {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("GpuParticles")
            .field("capacity", &self.capacity)
            .field("ssbo", &self.ssbo)
            .finish()
    }
}

#[derive(Debug)]
pub enum Backing {
    Cpu(CpuParticles),
    Gpu(GpuParticles),
}

impl Backing {
    pub fn capacity(&self) -> usize {
        match self {
            Backing::Cpu(cpu) => cpu.records.len(),
            Backing::Gpu(gpu) => gpu.capacity,
        }
    }

    pub fn is_gpu(&self) -> bool {
        matches!(self, Backing::Gpu(_))
    }
}

/// Shared pool of particle backings, keyed with a slotmap so stale keys
/// can never reach a recycled buffer.
#[derive(Default, Debug)]
pub struct ParticlePool {
    buffers: SlotMap<BufferKey, Backing>,
    free: Vec<BufferKey>,
}

impl ParticlePool {
    pub fn new() -> ParticlePool {
        ParticlePool::default()
    }

    /// Hands out a backing of exactly `capacity` records, recycling a
    /// disposed one when available. GPU backing is chosen when the
    /// context supports compute+SSBO; allocation failure falls back to
    /// the CPU path silently.
    pub fn acquire(&mut self, gl_: &Rc<Gl>, caps: &Capabilities, capacity: usize) -> BufferKey {
        let wants_gpu = caps.supports_gpu_particles();
        if let Some(pos) = self.free.iter().position(|key| {
            self.buffers
                .get(*key)
                .map(|b| b.capacity() == capacity && b.is_gpu() == wants_gpu)
                .unwrap_or(false)
        }) {
            let key = self.free.swap_remove(pos);
            match self.buffers.get_mut(key) {
                Some(Backing::Cpu(cpu)) => cpu.reset(),
                Some(Backing::Gpu(gpu)) => gpu.reset(),
                None => {}
            }
            return key;
        }

        let backing = if wants_gpu {
            match GpuParticles::new(gl_, capacity) {
                Ok(gpu) => Backing::Gpu(gpu),
                Err(err) => {
                    log::debug!("GPU particle buffer init failed ({}), using CPU path", err);
                    Backing::Cpu(CpuParticles::new(capacity))
                }
            }
        } else {
            Backing::Cpu(CpuParticles::new(capacity))
        };
        self.buffers.insert(backing)
    }

    /// Returns a disposed buffer to the free list.
    pub fn release(&mut self, key: BufferKey) {
        if self.buffers.contains_key(key) && !self.free.contains(&key) {
            self.free.push(key);
        }
    }

    pub fn get_mut(&mut self, key: BufferKey) -> Option<&mut Backing> {
        self.buffers.get_mut(key)
    }

    pub fn get(&self, key: BufferKey) -> Option<&Backing> {
        self.buffers.get(key)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }
}
