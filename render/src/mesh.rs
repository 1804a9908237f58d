//! Mesh and buffer wrappers.
//!
//! A [`Mesh`] owns a VAO with interleaved position/normal/uv vertices and
//! an index buffer. Identity (for draw-order grouping) is a monotonic
//! counter, not the VAO name, because drivers recycle object names.

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;
use crate::geom::Aabb;
use bytemuck::{Pod, Zeroable};
use nalgebra_glm::Vec3;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identity used to group draws by mesh.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct MeshId(u64);

impl MeshId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(1);

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Vertex {
        Vertex {
            position,
            normal,
            uv,
        }
    }
}

pub const VERTEX_STRIDE: GLsizei = std::mem::size_of::<Vertex>() as GLsizei;

pub struct Mesh {
    gl: Rc<Gl>,
    id: MeshId,
    vao: GLuint,
    vbo: GLuint,
    ebo: GLuint,
    index_count: GLsizei,
    local_aabb: Aabb,
}

impl Mesh {
    pub fn new(gl_: &Rc<Gl>, vertices: &[Vertex], indices: &[u32]) -> Mesh {
        let local_aabb = {
            let points: Vec<Vec3> = vertices
                .iter()
                .map(|v| Vec3::new(v.position[0], v.position[1], v.position[2]))
                .collect();
            Aabb::from_points(points.iter())
        };

        let mut vao = 0;
        let mut vbo = 0;
        let mut ebo = 0;
        unsafe {
            // creation may happen mid-frame from a lazy loader; leave the
            // caller's bindings as we found them
            let mut prev_vao: GLint = 0;
            let mut prev_array: GLint = 0;
            gl_.GetIntegerv(gl::VERTEX_ARRAY_BINDING, &mut prev_vao);
            gl_.GetIntegerv(gl::ARRAY_BUFFER_BINDING, &mut prev_array);

            gl_.GenVertexArrays(1, &mut vao);
            gl_.GenBuffers(1, &mut vbo);
            gl_.GenBuffers(1, &mut ebo);

            gl_.BindVertexArray(vao);
            gl_.BindBuffer(gl::ARRAY_BUFFER, vbo);
            gl_.BufferData(
                gl::ARRAY_BUFFER,
                std::mem::size_of_val(vertices) as GLsizeiptr,
                vertices.as_ptr() as *const GLvoid,
                gl::STATIC_DRAW,
            );
            gl_.BindBuffer(gl::ELEMENT_ARRAY_BUFFER, ebo);
            gl_.BufferData(
                gl::ELEMENT_ARRAY_BUFFER,
                std::mem::size_of_val(indices) as GLsizeiptr,
                indices.as_ptr() as *const GLvoid,
                gl::STATIC_DRAW,
            );

            gl_.EnableVertexAttribArray(0);
            gl_.VertexAttribPointer(0, 3, gl::FLOAT, gl::FALSE, VERTEX_STRIDE, 0 as *const GLvoid);
            gl_.EnableVertexAttribArray(1);
            gl_.VertexAttribPointer(
                1,
                3,
                gl::FLOAT,
                gl::FALSE,
                VERTEX_STRIDE,
                (3 * 4) as *const GLvoid,
            );
            gl_.EnableVertexAttribArray(2);
            gl_.VertexAttribPointer(
                2,
                2,
                gl::FLOAT,
                gl::FALSE,
                VERTEX_STRIDE,
                (6 * 4) as *const GLvoid,
            );

            gl_.BindVertexArray(prev_vao as GLuint);
            gl_.BindBuffer(gl::ARRAY_BUFFER, prev_array as GLuint);
        }

        Mesh {
            gl: Rc::clone(gl_),
            id: MeshId(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed)),
            vao,
            vbo,
            ebo,
            index_count: indices.len() as GLsizei,
            local_aabb,
        }
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn vao(&self) -> GLuint {
        self.vao
    }

    /// Raw geometry buffers, for render paths that assemble their own VAO
    /// (particle mesh mode attaches instance attributes over these).
    pub fn buffers(&self) -> (GLuint, GLuint, GLsizei) {
        (self.vbo, self.ebo, self.index_count)
    }

    pub fn index_count(&self) -> GLsizei {
        self.index_count
    }

    pub fn local_aabb(&self) -> Aabb {
        self.local_aabb
    }

    /// Indexed draw; the caller has bound the VAO (through a state scope).
    pub fn draw(&self) {
        unsafe {
            self.gl.DrawElements(
                gl::TRIANGLES,
                self.index_count,
                gl::UNSIGNED_INT,
                std::ptr::null(),
            );
        }
    }

    pub fn draw_instanced(&self, instances: GLsizei) {
        unsafe {
            self.gl.DrawElementsInstanced(
                gl::TRIANGLES,
                self.index_count,
                gl::UNSIGNED_INT,
                std::ptr::null(),
                instances,
            );
        }
    }

    //------------------------------------------------------------------
    // primitives

    pub fn quad(gl_: &Rc<Gl>) -> Mesh {
        let n = [0.0, 0.0, 1.0];
        let vertices = [
            Vertex::new([-0.5, -0.5, 0.0], n, [0.0, 0.0]),
            Vertex::new([0.5, -0.5, 0.0], n, [1.0, 0.0]),
            Vertex::new([0.5, 0.5, 0.0], n, [1.0, 1.0]),
            Vertex::new([-0.5, 0.5, 0.0], n, [0.0, 1.0]),
        ];
        let indices = [0u32, 1, 2, 0, 2, 3];
        Mesh::new(gl_, &vertices, &indices)
    }

    pub fn cube(gl_: &Rc<Gl>) -> Mesh {
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            // (normal, u axis, v axis)
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ];
        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (i, (n, u, v)) in faces.iter().enumerate() {
            let base = (i * 4) as u32;
            for (du, dv, uv) in [
                (-0.5, -0.5, [0.0, 0.0]),
                (0.5, -0.5, [1.0, 0.0]),
                (0.5, 0.5, [1.0, 1.0]),
                (-0.5, 0.5, [0.0, 1.0]),
            ] {
                let position = [
                    n[0] * 0.5 + u[0] * du + v[0] * dv,
                    n[1] * 0.5 + u[1] * du + v[1] * dv,
                    n[2] * 0.5 + u[2] * du + v[2] * dv,
                ];
                vertices.push(Vertex::new(position, *n, uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Mesh::new(gl_, &vertices, &indices)
    }

    pub fn tetrahedron(gl_: &Rc<Gl>) -> Mesh {
        let r = 0.5f32;
        let positions = [
            [r, r, r],
            [r, -r, -r],
            [-r, r, -r],
            [-r, -r, r],
        ];
        let indices = [0u32, 2, 1, 0, 1, 3, 0, 3, 2, 1, 2, 3];
        Mesh::from_point_normals(gl_, &positions, &indices)
    }

    pub fn octahedron(gl_: &Rc<Gl>) -> Mesh {
        let r = 0.5f32;
        let positions = [
            [r, 0.0, 0.0],
            [-r, 0.0, 0.0],
            [0.0, r, 0.0],
            [0.0, -r, 0.0],
            [0.0, 0.0, r],
            [0.0, 0.0, -r],
        ];
        let indices = [
            0u32, 2, 4, 2, 1, 4, 1, 3, 4, 3, 0, 4, 2, 0, 5, 1, 2, 5, 3, 1, 5, 0, 3, 5,
        ];
        Mesh::from_point_normals(gl_, &positions, &indices)
    }

    pub fn icosahedron(gl_: &Rc<Gl>) -> Mesh {
        // golden-ratio construction scaled to radius 0.5
        let phi = (1.0 + 5.0f32.sqrt()) / 2.0;
        let scale = 0.5 / (1.0 + phi * phi).sqrt();
        let a = scale;
        let b = phi * scale;
        let positions = [
            [-a, b, 0.0],
            [a, b, 0.0],
            [-a, -b, 0.0],
            [a, -b, 0.0],
            [0.0, -a, b],
            [0.0, a, b],
            [0.0, -a, -b],
            [0.0, a, -b],
            [b, 0.0, -a],
            [b, 0.0, a],
            [-b, 0.0, -a],
            [-b, 0.0, a],
        ];
        let indices = [
            0u32, 11, 5, 0, 5, 1, 0, 1, 7, 0, 7, 10, 0, 10, 11, 1, 5, 9, 5, 11, 4, 11, 10, 2, 10,
            7, 6, 7, 1, 8, 3, 9, 4, 3, 4, 2, 3, 2, 6, 3, 6, 8, 3, 8, 9, 4, 9, 5, 2, 4, 11, 6, 2,
            10, 8, 6, 7, 9, 8, 1,
        ];
        Mesh::from_point_normals(gl_, &positions, &indices)
    }

    /// Builds a mesh whose normals are the normalized vertex positions —
    /// good enough for the small particle solids.
    fn from_point_normals(gl_: &Rc<Gl>, positions: &[[f32; 3]], indices: &[u32]) -> Mesh {
        let vertices: Vec<Vertex> = positions
            .iter()
            .map(|p| {
                let len = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt().max(1e-6);
                Vertex::new(*p, [p[0] / len, p[1] / len, p[2] / len], [0.0, 0.0])
            })
            .collect();
        Mesh::new(gl_, &vertices, indices)
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        unsafe {
            self.gl.DeleteVertexArrays(1, &self.vao);
            self.gl.DeleteBuffers(1, &self.vbo);
            self.gl.DeleteBuffers(1, &self.ebo);
        }
    }
}

impl std::fmt::Debug for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Mesh")
            .field("id", &self.id)
            .field("indices", &self.index_count)
            .finish()
    }
}

/// Dynamic buffer that grows geometrically and is reused across frames
/// (instance matrices, CPU particle uploads, line/sprite batches).
pub struct GrowableBuffer {
    gl: Rc<Gl>,
    obj: GLuint,
    capacity: usize,
    usage: GLenum,
}

impl GrowableBuffer {
    pub fn new(gl_: &Rc<Gl>, usage: GLenum) -> GrowableBuffer {
        let mut obj = 0;
        unsafe { gl_.GenBuffers(1, &mut obj) };
        GrowableBuffer {
            gl: Rc::clone(gl_),
            obj,
            capacity: 0,
            usage,
        }
    }

    pub fn id(&self) -> GLuint {
        self.obj
    }

    /// Uploads `data`, reallocating geometrically when it outgrows the
    /// current allocation. The caller has bound `self.id()` to `target`.
    pub fn upload(&mut self, target: GLenum, data: &[u8]) {
        unsafe {
            if data.len() > self.capacity {
                let mut new_capacity = self.capacity.max(1024);
                while new_capacity < data.len() {
                    new_capacity *= 2;
                }
                self.gl.BufferData(
                    target,
                    new_capacity as GLsizeiptr,
                    std::ptr::null(),
                    self.usage,
                );
                self.capacity = new_capacity;
            }
            self.gl.BufferSubData(
                target,
                0,
                data.len() as GLsizeiptr,
                data.as_ptr() as *const GLvoid,
            );
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Drop for GrowableBuffer {
    fn drop(&mut self) {
        unsafe { self.gl.DeleteBuffers(1, &self.obj) };
    }
}
