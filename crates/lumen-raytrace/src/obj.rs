//! Wavefront OBJ import.
//!
//! Reads `v`, `vn`, `vt` and `f` statements. Faces with more than three
//! corners are fan-triangulated; negative indices count back from the most
//! recently defined entry. Everything else (groups, materials, smoothing)
//! is ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;
use lumen_math::{Point2, Point3, Vec3};

use crate::error::{Result, TraceError};
use crate::mesh::Mesh;
use crate::settings::MeshSettings;

/// Vertex, texture and normal index of one face corner (0 = unset).
type Corner = (u32, u32, u32);

fn obj_error(line: usize, message: impl Into<String>) -> TraceError {
    TraceError::Obj {
        line,
        message: message.into(),
    }
}

fn parse_floats<'a>(
    line: usize,
    tokens: impl Iterator<Item = &'a str>,
    min: usize,
) -> Result<Vec<f64>> {
    let values = tokens
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| obj_error(line, format!("invalid number '{t}'")))
        })
        .collect::<Result<Vec<_>>>()?;
    if values.len() < min {
        return Err(obj_error(
            line,
            format!("expected at least {min} coordinates, found {}", values.len()),
        ));
    }
    Ok(values)
}

/// Resolve a possibly negative OBJ index against `count` defined entries.
fn resolve_index(line: usize, token: &str, count: u32) -> Result<u32> {
    if token.is_empty() {
        return Ok(0);
    }
    let raw: i64 = token
        .parse()
        .map_err(|_| obj_error(line, format!("invalid index '{token}'")))?;
    let resolved = if raw < 0 { count as i64 + 1 + raw } else { raw };
    if resolved <= 0 || resolved > count as i64 {
        return Err(obj_error(
            line,
            format!("index {raw} out of range (1..={count})"),
        ));
    }
    Ok(resolved as u32)
}

fn parse_corner(line: usize, token: &str, counts: (u32, u32, u32)) -> Result<Corner> {
    let mut parts = token.split('/');
    let v = parts.next().unwrap_or_default();
    let t = parts.next().unwrap_or_default();
    let n = parts.next().unwrap_or_default();
    if v.is_empty() {
        return Err(obj_error(line, format!("face corner '{token}' has no vertex")));
    }
    Ok((
        resolve_index(line, v, counts.0)?,
        resolve_index(line, t, counts.1)?,
        resolve_index(line, n, counts.2)?,
    ))
}

/// Parse OBJ text into a mesh. The mesh is not prepared.
pub fn parse_obj<R: BufRead>(reader: R, settings: MeshSettings) -> Result<Mesh> {
    let mut mesh = Mesh::with_settings(settings);
    let (mut vertices, mut uvs, mut normals) = (0u32, 0u32, 0u32);
    let mut faces = 0usize;

    for (number, text) in reader.lines().enumerate() {
        let text = text?;
        let line = number + 1;
        let mut tokens = text.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };

        match keyword {
            "v" => {
                let c = parse_floats(line, tokens, 3)?;
                vertices = mesh.add_vertex(Point3::new(c[0], c[1], c[2]));
            }
            "vn" => {
                let c = parse_floats(line, tokens, 3)?;
                normals = mesh.add_normal(Vec3::new(c[0], c[1], c[2]));
            }
            "vt" => {
                let c = parse_floats(line, tokens, 1)?;
                uvs = mesh.add_uv(Point2::new(c[0], c.get(1).copied().unwrap_or(0.0)));
            }
            "f" => {
                let corners = tokens
                    .map(|t| parse_corner(line, t, (vertices, uvs, normals)))
                    .collect::<Result<Vec<_>>>()?;
                if corners.len() < 3 {
                    return Err(obj_error(line, "face needs at least 3 corners"));
                }
                for i in 1..corners.len() - 1 {
                    let fan = [corners[0], corners[i], corners[i + 1]];
                    mesh.add_triangle(
                        fan.map(|c| c.0),
                        fan.map(|c| c.2),
                        fan.map(|c| c.1),
                    )
                    .map_err(|e| obj_error(line, e.to_string()))?;
                }
                faces += 1;
            }
            _ => {}
        }
    }

    debug!(
        "parsed OBJ: {} vertices, {} normals, {} uvs, {} faces, {} triangles",
        vertices,
        normals,
        uvs,
        faces,
        mesh.triangles().len()
    );
    Ok(mesh)
}

/// Load an OBJ file from disk. The mesh is not prepared.
pub fn load_obj(path: impl AsRef<Path>, settings: MeshSettings) -> Result<Mesh> {
    let file = File::open(path.as_ref())?;
    parse_obj(BufReader::new(file), settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Geometry, Ray};

    const QUAD: &str = "\
# a unit quad in the XZ plane
o quad
v 0 0 0
v 1 0 0
v 1 0 1
v 0 0 1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 1 0
s off
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn test_quad_is_fanned() {
        let mesh = parse_obj(QUAD.as_bytes(), MeshSettings::default()).unwrap();
        assert_eq!(mesh.vertices().len(), 4);
        assert_eq!(mesh.triangles().len(), 2);
        assert_eq!(mesh.triangles()[0].vertices, [1, 2, 3]);
        assert_eq!(mesh.triangles()[1].vertices, [1, 3, 4]);
        assert_eq!(mesh.triangles()[1].uvs, [1, 3, 4]);
        assert_eq!(mesh.triangles()[1].normals, [1, 1, 1]);
    }

    #[test]
    fn test_parsed_quad_intersects() {
        let mut mesh = parse_obj(QUAD.as_bytes(), MeshSettings::default()).unwrap();
        mesh.prepare().unwrap();
        let ray = Ray::new(Point3::new(0.75, 2.0, 0.25), Vec3::new(0.0, -1.0, 0.0));
        let hit = mesh.intersect_ray(&ray).unwrap();
        assert!((hit.distance - 2.0).abs() < 1e-12);
        assert!((hit.uv.x - 0.75).abs() < 1e-12);
        assert!((hit.uv.y - 0.25).abs() < 1e-12);
        assert!((hit.normal - Vec3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_corner_forms_and_negative_indices() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 0 1
f -3//1 -2//1 -1//1
f 1 2 3
vt 0.5
f 1/1 2/1 3/1
";
        let mesh = parse_obj(text.as_bytes(), MeshSettings::default()).unwrap();
        let tris = mesh.triangles();
        assert_eq!(tris.len(), 3);
        assert_eq!(tris[0].vertices, [1, 2, 3]);
        assert_eq!(tris[0].normals, [1, 1, 1]);
        assert_eq!(tris[0].uvs, [0, 0, 0]);
        assert_eq!(tris[1].normals, [0, 0, 0]);
        assert_eq!(tris[2].uvs, [1, 1, 1]);
    }

    #[test]
    fn test_bad_number_reports_line() {
        let text = "v 0 0 0\nv 1 x 0\n";
        match parse_obj(text.as_bytes(), MeshSettings::default()) {
            Err(TraceError::Obj { line, message }) => {
                assert_eq!(line, 2);
                assert!(message.contains("'x'"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_index() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 4\n";
        assert!(matches!(
            parse_obj(text.as_bytes(), MeshSettings::default()),
            Err(TraceError::Obj { line: 4, .. })
        ));
        let text = "v 0 0 0\nf 1 1\n";
        assert!(matches!(
            parse_obj(text.as_bytes(), MeshSettings::default()),
            Err(TraceError::Obj { line: 2, .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_obj("/nonexistent/model.obj", MeshSettings::default()),
            Err(TraceError::Io(_))
        ));
    }
}
