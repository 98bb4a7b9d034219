//! GLES2 drawing for the hardware rendered clients

use cgmath::{perspective, Deg, Matrix4, Point3, Vector3};
use glow::HasContext;

use crate::{error::SetupError, window::Size};

/// Clear the whole window to one opaque color
pub fn clear(gl: &glow::Context, rgb: [f32; 3], size: Size) {
    let [r, g, b] = rgb;
    // SAFETY: callers hold a current context
    unsafe {
        gl.viewport(0, 0, size.width as i32, size.height as i32);
        gl.clear_color(r, g, b, 1.0);
        gl.clear(glow::COLOR_BUFFER_BIT);
    }
}

const VERTEX_SHADER: &str = r#"
attribute vec3 position;
attribute vec3 color;
uniform mat4 mvp;
varying vec3 v_color;

void main() {
    gl_Position = mvp * vec4(position, 1.0);
    v_color = color;
}
"#;

const FRAGMENT_SHADER: &str = r#"
precision mediump float;
varying vec3 v_color;

void main() {
    gl_FragColor = vec4(v_color, 1.0);
}
"#;

const POSITION: u32 = 0;
const COLOR: u32 = 1;
const FLOATS_PER_VERTEX: usize = 6;

/// Faces of the unit cube: normal axis, side and color
const FACES: [(usize, f32, [f32; 3]); 6] = [
    (0, 1.0, [1.0, 0.0, 0.0]),
    (0, -1.0, [0.0, 1.0, 1.0]),
    (1, 1.0, [0.0, 1.0, 0.0]),
    (1, -1.0, [1.0, 0.0, 1.0]),
    (2, 1.0, [0.0, 0.0, 1.0]),
    (2, -1.0, [1.0, 1.0, 0.0]),
];

/// Interleaved position and color of the 36 vertices of a cube spanning `-1.0..=1.0`
pub fn cube_vertices() -> Vec<[f32; FLOATS_PER_VERTEX]> {
    let mut vertices = Vec::with_capacity(36);
    for (axis, side, color) in FACES {
        let u = (axis + 1) % 3;
        let v = (axis + 2) % 3;
        let corner = |a: f32, b: f32| {
            let mut p = [0.0; 3];
            p[axis] = side;
            p[u] = a;
            p[v] = b;
            [p[0], p[1], p[2], color[0], color[1], color[2]]
        };
        let quad = [corner(-1.0, -1.0), corner(1.0, -1.0), corner(1.0, 1.0), corner(-1.0, 1.0)];
        vertices.extend_from_slice(&[quad[0], quad[1], quad[2], quad[0], quad[2], quad[3]]);
    }
    vertices
}

/// Model-view-projection of the cube rotated by `degrees`, seen from a fixed camera
///
/// The cube spins around the vertical axis and, at half the rate, around the horizontal one.
pub fn mvp(size: Size, degrees: f32) -> Matrix4<f32> {
    let aspect = size.width.max(1) as f32 / size.height.max(1) as f32;
    let projection = perspective(Deg(45.0), aspect, 0.1, 100.0);
    let view = Matrix4::look_at_rh(
        Point3::new(0.0, 0.0, 6.0),
        Point3::new(0.0, 0.0, 0.0),
        Vector3::unit_y(),
    );
    let model = Matrix4::from_angle_y(Deg(degrees)) * Matrix4::from_angle_x(Deg(degrees / 2.0));
    projection * view * model
}

unsafe fn compile(gl: &glow::Context, kind: u32, source: &str) -> Result<glow::Shader, SetupError> {
    let shader = gl.create_shader(kind).map_err(SetupError::Gles)?;
    gl.shader_source(shader, source);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        return Err(SetupError::Gles(format!("shader compilation failed: {}", log)));
    }
    Ok(shader)
}

/// Draws a rotating, face-colored cube
#[derive(Debug)]
pub struct CubeRenderer {
    program: glow::Program,
    vertices: glow::Buffer,
    mvp: Option<glow::UniformLocation>,
}

impl CubeRenderer {
    /// Compile the shaders and upload the cube
    ///
    /// The context must be current.
    pub fn new(gl: &glow::Context) -> Result<CubeRenderer, SetupError> {
        // SAFETY: callers hold a current context
        unsafe {
            let vertex = compile(gl, glow::VERTEX_SHADER, VERTEX_SHADER)?;
            let fragment = compile(gl, glow::FRAGMENT_SHADER, FRAGMENT_SHADER)?;

            let program = gl.create_program().map_err(SetupError::Gles)?;
            gl.attach_shader(program, vertex);
            gl.attach_shader(program, fragment);
            gl.bind_attrib_location(program, POSITION, "position");
            gl.bind_attrib_location(program, COLOR, "color");
            gl.link_program(program);
            gl.detach_shader(program, vertex);
            gl.detach_shader(program, fragment);
            gl.delete_shader(vertex);
            gl.delete_shader(fragment);
            if !gl.get_program_link_status(program) {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(SetupError::Gles(format!("program link failed: {}", log)));
            }

            let bytes: Vec<u8> = cube_vertices()
                .iter()
                .flatten()
                .flat_map(|f| f.to_ne_bytes())
                .collect();
            let vertices = gl.create_buffer().map_err(SetupError::Gles)?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vertices));
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, &bytes, glow::STATIC_DRAW);

            let mvp = gl.get_uniform_location(program, "mvp");
            Ok(CubeRenderer { program, vertices, mvp })
        }
    }

    /// Draw the cube rotated by `degrees` into a window of `size`
    pub fn draw(&self, gl: &glow::Context, size: Size, degrees: f32) {
        let matrix = mvp(size, degrees);
        let stride = (FLOATS_PER_VERTEX * std::mem::size_of::<f32>()) as i32;
        // SAFETY: callers hold the context `self` was created in current
        unsafe {
            gl.viewport(0, 0, size.width as i32, size.height as i32);
            gl.enable(glow::DEPTH_TEST);
            gl.clear_color(0.0, 0.0, 0.0, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);

            gl.use_program(Some(self.program));
            // cgmath is column major like GLES, no transpose
            let columns: &[f32; 16] = matrix.as_ref();
            gl.uniform_matrix_4_f32_slice(self.mvp.as_ref(), false, columns);

            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vertices));
            gl.vertex_attrib_pointer_f32(POSITION, 3, glow::FLOAT, false, stride, 0);
            let offset = 3 * std::mem::size_of::<f32>() as i32;
            gl.vertex_attrib_pointer_f32(COLOR, 3, glow::FLOAT, false, stride, offset);
            gl.enable_vertex_attrib_array(POSITION);
            gl.enable_vertex_attrib_array(COLOR);

            gl.draw_arrays(glow::TRIANGLES, 0, 36);

            gl.disable_vertex_attrib_array(COLOR);
            gl.disable_vertex_attrib_array(POSITION);
        }
    }

    /// Free the GL objects, with the context current
    pub fn destroy(self, gl: &glow::Context) {
        // SAFETY: callers hold the context `self` was created in current
        unsafe {
            gl.delete_buffer(self.vertices);
            gl.delete_program(self.program);
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{SquareMatrix, Vector4};

    use super::*;

    #[test]
    fn cube_has_two_triangles_per_face() {
        let vertices = cube_vertices();
        assert_eq!(vertices.len(), 36);
        for vertex in &vertices {
            assert!(vertex[..3].iter().all(|c| c.abs() == 1.0));
        }
        for face in vertices.chunks(6) {
            let color = &face[0][3..];
            assert!(face.iter().all(|v| &v[3..] == color));
        }
    }

    #[test]
    fn unrotated_cube_center_is_in_front_of_the_camera() {
        let clip = mvp(Size::new(800, 600), 0.0) * Vector4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-6);
        assert!(ndc.y.abs() < 1e-6);
        assert!(ndc.z > -1.0 && ndc.z < 1.0);
    }

    #[test]
    fn full_turn_is_identity_rotation() {
        let size = Size::new(640, 480);
        let a = mvp(size, 0.0);
        let b = mvp(size, 720.0);
        let diff: [[f32; 4]; 4] = (a - b).into();
        assert!(diff.iter().flatten().all(|d| d.abs() < 1e-4));
    }

    #[test]
    fn degenerate_window_yields_finite_matrix() {
        let matrix = mvp(Size::new(0, 0), 30.0);
        let columns: &[f32; 16] = matrix.as_ref();
        assert!(columns.iter().all(|c| c.is_finite()));
        assert!(matrix.determinant().is_finite());
    }
}
