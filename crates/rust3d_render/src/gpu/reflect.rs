//! WGSL interface reflection
//!
//! Both backends need to know which uniform slots and vertex inputs a stage
//! declares before the program is linked. This module reads them straight
//! from the source text:
//!
//! - module-scope `@group(0) @binding(N) var<uniform> name: type;`
//! - `@location(N) name: type` parameters of the vertex entry point, or the
//!   `@location` members of a struct the entry point takes by value
//!
//! Only the kinds [`VariableKind`] names are understood: uniforms are
//! `mat4x4<f32>` or `vec3<f32>`, vertex inputs are `vec3<f32>`. Anything
//! else, such as a `vec4<f32>` attribute or a uniform struct, is reported
//! as a compile error naming the unsupported type.
//!
//! It also does the structural checks a compiler front end would report
//! first (empty source, unbalanced delimiters, missing entry point), so the
//! headless backend produces realistic info logs without a real compiler.

use crate::gpu::StageKind;
use crate::shader::VariableKind;

/// A `var<uniform>` declaration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniformSlot {
    pub binding: u32,
    pub name: String,
    pub kind: VariableKind,
}

/// A `@location` input of the vertex entry point
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputSlot {
    pub location: u32,
    pub name: String,
    pub kind: VariableKind,
}

/// Interface of one compiled stage
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageReflection {
    pub uniforms: Vec<UniformSlot>,
    pub inputs: Vec<InputSlot>,
}

/// Interface of a linked program
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgramReflection {
    /// Vertex attributes, from the vertex stage inputs
    pub attributes: Vec<InputSlot>,
    /// Uniform slots of both stages, sorted by binding
    pub uniforms: Vec<UniformSlot>,
}

impl ProgramReflection {
    pub fn attribute(&self, name: &str) -> Option<&InputSlot> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformSlot> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    pub fn uniform_at(&self, binding: u32) -> Option<&UniformSlot> {
        self.uniforms.iter().find(|u| u.binding == binding)
    }
}

/// Check a stage's structure and read its interface
///
/// The error string is the info log a failed compile reports.
pub fn reflect_stage(source: &str, kind: StageKind) -> Result<StageReflection, String> {
    let code = strip_comments(source);
    if code.trim().is_empty() {
        return Err(format!("{} shader source is empty", kind));
    }
    check_delimiters(&code)?;

    let entry = kind.entry_point();
    let params = entry_parameters(&code, entry)
        .ok_or_else(|| format!("error: missing entry point 'fn {}'", entry))?;

    let uniforms = uniform_declarations(&code)?;
    let inputs = match kind {
        StageKind::Vertex => vertex_inputs(&code, params)?,
        StageKind::Fragment => Vec::new(),
    };

    Ok(StageReflection { uniforms, inputs })
}

/// Merge two stage interfaces into a program interface
///
/// A binding may appear in both stages only with the same name and type.
/// The error string is the info log a failed link reports.
pub fn link_stages(
    vertex: &StageReflection,
    fragment: &StageReflection,
) -> Result<ProgramReflection, String> {
    let mut uniforms = vertex.uniforms.clone();
    for slot in &fragment.uniforms {
        match uniforms.iter().find(|u| u.binding == slot.binding) {
            Some(shared) if shared == slot => continue,
            Some(shared) => {
                return Err(format!(
                    "error: binding {} is '{}: {}' in the vertex stage but '{}: {}' in the fragment stage",
                    slot.binding, shared.name, shared.kind, slot.name, slot.kind
                ))
            }
            None => {}
        }
        if uniforms.iter().any(|u| u.name == slot.name) {
            return Err(format!(
                "error: uniform '{}' is bound to different slots in the vertex and fragment stages",
                slot.name
            ));
        }
        uniforms.push(slot.clone());
    }
    uniforms.sort_by_key(|u| u.binding);

    Ok(ProgramReflection {
        attributes: vertex.inputs.clone(),
        uniforms,
    })
}

/// Map a WGSL type to a supported variable kind
pub fn parse_kind(ty: &str) -> Option<VariableKind> {
    let compact: String = ty.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.as_str() {
        "mat4x4<f32>" | "mat4x4f" => Some(VariableKind::Mat4),
        "vec3<f32>" | "vec3f" => Some(VariableKind::Vec3),
        _ => None,
    }
}

/// Replace `//` and `/* */` comments with whitespace, keeping line breaks
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut block_depth = 0usize;

    while let Some(c) = chars.next() {
        if block_depth > 0 {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                block_depth -= 1;
                if block_depth == 0 {
                    out.push(' ');
                }
            } else if c == '/' && chars.peek() == Some(&'*') {
                chars.next();
                block_depth += 1;
            } else if c == '\n' {
                out.push('\n');
            }
            continue;
        }

        if c == '/' && chars.peek() == Some(&'/') {
            for c in chars.by_ref() {
                if c == '\n' {
                    out.push('\n');
                    break;
                }
            }
        } else if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            block_depth = 1;
        } else {
            out.push(c);
        }
    }
    out
}

fn check_delimiters(code: &str) -> Result<(), String> {
    let mut open: Vec<(char, usize)> = Vec::new();
    for (line_no, line) in code.lines().enumerate() {
        let line_no = line_no + 1;
        for c in line.chars() {
            match c {
                '(' | '{' | '[' => open.push((c, line_no)),
                ')' | '}' | ']' => {
                    let expected = match c {
                        ')' => '(',
                        '}' => '{',
                        _ => '[',
                    };
                    match open.pop() {
                        Some((o, _)) if o == expected => {}
                        _ => return Err(format!("error:{}: unexpected '{}'", line_no, c)),
                    }
                }
                _ => {}
            }
        }
    }
    match open.pop() {
        Some((c, line_no)) => Err(format!("error:{}: unclosed '{}'", line_no, c)),
        None => Ok(()),
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Parameter list text of `fn <entry>(...)`
fn entry_parameters<'a>(code: &'a str, entry: &str) -> Option<&'a str> {
    let mut search = 0;
    while let Some(pos) = code[search..].find("fn") {
        let start = search + pos;
        search = start + 2;

        if code[..start].chars().next_back().is_some_and(is_ident_char) {
            continue;
        }
        let after_fn = &code[start + 2..];
        if !after_fn.starts_with(char::is_whitespace) {
            continue;
        }
        let Some(after_name) = after_fn.trim_start().strip_prefix(entry) else {
            continue;
        };
        if after_name.starts_with(is_ident_char) {
            continue;
        }
        let inner = after_name.trim_start().strip_prefix('(')?;

        let mut depth = 1;
        for (i, c) in inner.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&inner[..i]);
                    }
                }
                _ => {}
            }
        }
        return None;
    }
    None
}

/// Value of an integer attribute such as `@binding(2)`
fn attribute_value(text: &str, attribute: &str) -> Result<Option<u32>, String> {
    let marker = format!("@{}", attribute);
    let Some(pos) = text.find(&marker) else {
        return Ok(None);
    };
    let rest = text[pos + marker.len()..].trim_start();
    let value = rest
        .strip_prefix('(')
        .and_then(|r| r.split_once(')'))
        .map(|(value, _)| value.trim())
        .ok_or_else(|| format!("error: malformed {}", marker))?;
    value
        .parse()
        .map(Some)
        .map_err(|_| format!("error: {} expects an integer, got '{}'", marker, value))
}

fn uniform_declarations(code: &str) -> Result<Vec<UniformSlot>, String> {
    const DECL: &str = "var<uniform>";
    let mut slots: Vec<UniformSlot> = Vec::new();
    let mut search = 0;

    while let Some(pos) = code[search..].find(DECL) {
        let start = search + pos;
        let decl_start = code[..start]
            .rfind(|c: char| matches!(c, ';' | '{' | '}'))
            .map_or(0, |i| i + 1);
        let attributes = &code[decl_start..start];

        let tail = &code[start + DECL.len()..];
        let end = tail
            .find(';')
            .ok_or_else(|| "error: uniform declaration is missing ';'".to_string())?;
        search = start + DECL.len() + end + 1;

        let body = tail[..end].trim();
        let (name, ty) = body
            .split_once(':')
            .ok_or_else(|| format!("error: uniform '{}' has no type", body))?;
        let name = name.trim();
        let ty = ty.trim();

        let binding = attribute_value(attributes, "binding")?
            .ok_or_else(|| format!("error: uniform '{}' has no @binding", name))?;
        if let Some(group) = attribute_value(attributes, "group")? {
            if group != 0 {
                return Err(format!(
                    "error: uniform '{}' uses @group({}); only group 0 is supported",
                    name, group
                ));
            }
        }
        let kind = parse_kind(ty)
            .ok_or_else(|| format!("error: uniform '{}' has unsupported type '{}'", name, ty))?;

        if slots.iter().any(|s| s.binding == binding) {
            return Err(format!("error: binding {} is declared twice", binding));
        }
        if slots.iter().any(|s| s.name == name) {
            return Err(format!("error: redeclaration of '{}'", name));
        }
        slots.push(UniformSlot {
            binding,
            name: name.to_string(),
            kind,
        });
    }
    Ok(slots)
}

/// Split on commas outside parentheses and angle brackets
fn split_top_level(params: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in params.char_indices() {
        match c {
            '(' | '<' => depth += 1,
            ')' | '>' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&params[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&params[start..]);
    parts
}

/// Member list of `struct <name> { ... }`
fn struct_body<'a>(code: &'a str, name: &str) -> Option<&'a str> {
    let mut search = 0;
    while let Some(pos) = code[search..].find("struct") {
        let start = search + pos;
        search = start + "struct".len();

        if code[..start].chars().next_back().is_some_and(is_ident_char) {
            continue;
        }
        let after = &code[search..];
        if !after.starts_with(char::is_whitespace) {
            continue;
        }
        let Some(after_name) = after.trim_start().strip_prefix(name) else {
            continue;
        };
        if after_name.starts_with(is_ident_char) {
            continue;
        }
        let body = after_name.trim_start().strip_prefix('{')?;
        return body.find('}').map(|end| &body[..end]);
    }
    None
}

fn vertex_inputs(code: &str, params: &str) -> Result<Vec<InputSlot>, String> {
    let mut inputs: Vec<InputSlot> = Vec::new();
    for param in split_top_level(params) {
        let param = param.trim();
        if param.is_empty() || param.contains("@builtin") {
            continue;
        }
        if let Some((head, ty)) = param.split_once(':') {
            if !head.contains("@location") {
                if let Some(body) = struct_body(code, ty.trim()) {
                    for member in split_top_level(&body.replace(';', ",")) {
                        push_input(&mut inputs, member.trim())?;
                    }
                    continue;
                }
            }
        }
        push_input(&mut inputs, param)?;
    }
    Ok(inputs)
}

fn push_input(inputs: &mut Vec<InputSlot>, param: &str) -> Result<(), String> {
    if param.is_empty() || param.contains("@builtin") {
        return Ok(());
    }
    let (head, ty) = param
        .split_once(':')
        .ok_or_else(|| format!("error: parameter '{}' has no type", param))?;
    let name = head.rsplit(')').next().unwrap_or(head).trim();
    let location = attribute_value(head, "location")?
        .ok_or_else(|| format!("error: vertex input '{}' has no @location", name))?;
    let kind = match parse_kind(ty) {
        Some(VariableKind::Vec3) => VariableKind::Vec3,
        Some(VariableKind::Mat4) => {
            return Err(format!("error: vertex input '{}' cannot be a matrix", name))
        }
        None => {
            return Err(format!(
                "error: vertex input '{}' has unsupported type '{}'",
                name,
                ty.trim()
            ))
        }
    };

    if inputs.iter().any(|i| i.location == location) {
        return Err(format!("error: @location({}) is used twice", location));
    }
    inputs.push(InputSlot {
        location,
        name: name.to_string(),
        kind,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = include_str!("../shaders/mesh.vert.wgsl");
    const FRAGMENT: &str = include_str!("../shaders/mesh.frag.wgsl");

    #[test]
    fn test_reflect_mesh_vertex_stage() {
        let stage = reflect_stage(VERTEX, StageKind::Vertex).unwrap();
        let names: Vec<_> = stage.uniforms.iter().map(|u| (u.binding, u.name.as_str())).collect();
        assert_eq!(names, vec![(0, "u_model"), (1, "u_view"), (2, "u_projection")]);
        assert!(stage.uniforms.iter().all(|u| u.kind == VariableKind::Mat4));

        let inputs: Vec<_> = stage.inputs.iter().map(|i| (i.location, i.name.as_str())).collect();
        assert_eq!(inputs, vec![(0, "a_position"), (1, "a_normal")]);
    }

    #[test]
    fn test_reflect_mesh_fragment_stage() {
        let stage = reflect_stage(FRAGMENT, StageKind::Fragment).unwrap();
        let names: Vec<_> = stage.uniforms.iter().map(|u| (u.binding, u.name.as_str())).collect();
        assert_eq!(names, vec![(3, "u_light_position"), (4, "u_view_position")]);
        assert!(stage.inputs.is_empty());
    }

    #[test]
    fn test_link_mesh_program() {
        let vs = reflect_stage(VERTEX, StageKind::Vertex).unwrap();
        let fs = reflect_stage(FRAGMENT, StageKind::Fragment).unwrap();
        let program = link_stages(&vs, &fs).unwrap();
        assert_eq!(program.uniforms.len(), 5);
        assert_eq!(program.uniform("u_light_position").unwrap().kind, VariableKind::Vec3);
        assert_eq!(program.attribute("a_normal").unwrap().location, 1);
        assert_eq!(program.uniform_at(2).unwrap().name, "u_projection");
    }

    #[test]
    fn test_commented_declarations_are_ignored() {
        let src = "
            // @group(0) @binding(0) var<uniform> u_old: mat4x4<f32>;
            /* @group(0) @binding(1) var<uniform> u_older: vec3<f32>; */
            @group(0) @binding(2) var<uniform> u_live: vec3f;
            @fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(u_live, 1.0); }
        ";
        let stage = reflect_stage(src, StageKind::Fragment).unwrap();
        assert_eq!(stage.uniforms.len(), 1);
        assert_eq!(stage.uniforms[0].name, "u_live");
    }

    #[test]
    fn test_empty_source_fails() {
        let err = reflect_stage("  // nothing here\n", StageKind::Vertex).unwrap_err();
        assert!(err.contains("empty"));
    }

    #[test]
    fn test_missing_entry_point_fails() {
        let src = "@fragment fn main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let err = reflect_stage(src, StageKind::Fragment).unwrap_err();
        assert!(err.contains("fn fs_main"));
    }

    #[test]
    fn test_entry_point_needs_exact_name() {
        let src = "fn fs_main_helper() {}";
        assert!(reflect_stage(src, StageKind::Fragment).is_err());
    }

    #[test]
    fn test_unbalanced_braces_fail() {
        let src = "@fragment\nfn fs_main() -> @location(0) vec4<f32> {\n return vec4<f32>(1.0);\n";
        let err = reflect_stage(src, StageKind::Fragment).unwrap_err();
        assert!(err.contains("unclosed '{'"));
    }

    #[test]
    fn test_uniform_without_binding_fails() {
        let src = "var<uniform> u_model: mat4x4<f32>;\nfn vs_main() {}";
        let err = reflect_stage(src, StageKind::Vertex).unwrap_err();
        assert!(err.contains("no @binding"));
    }

    #[test]
    fn test_unsupported_uniform_type_fails() {
        let src = "@group(0) @binding(0) var<uniform> u_tint: vec4<f32>;\nfn fs_main() {}";
        let err = reflect_stage(src, StageKind::Fragment).unwrap_err();
        assert!(err.contains("unsupported type 'vec4<f32>'"));
    }

    #[test]
    fn test_nonzero_group_fails() {
        let src = "@group(1) @binding(0) var<uniform> u_view: mat4x4<f32>;\nfn fs_main() {}";
        assert!(reflect_stage(src, StageKind::Fragment).is_err());
    }

    #[test]
    fn test_builtin_inputs_are_skipped() {
        let src = "@vertex fn vs_main(@builtin(vertex_index) i: u32, @location(0) a_position: vec3<f32>) -> @builtin(position) vec4<f32> { return vec4<f32>(a_position, 1.0); }";
        let stage = reflect_stage(src, StageKind::Vertex).unwrap();
        assert_eq!(stage.inputs.len(), 1);
        assert_eq!(stage.inputs[0].name, "a_position");
    }

    #[test]
    fn test_link_rejects_conflicting_binding() {
        let vs = StageReflection {
            uniforms: vec![UniformSlot { binding: 0, name: "u_model".into(), kind: VariableKind::Mat4 }],
            inputs: Vec::new(),
        };
        let fs = StageReflection {
            uniforms: vec![UniformSlot { binding: 0, name: "u_light".into(), kind: VariableKind::Vec3 }],
            inputs: Vec::new(),
        };
        let err = link_stages(&vs, &fs).unwrap_err();
        assert!(err.contains("binding 0"));
    }

    #[test]
    fn test_link_shares_identical_binding() {
        let slot = UniformSlot { binding: 0, name: "u_model".into(), kind: VariableKind::Mat4 };
        let vs = StageReflection { uniforms: vec![slot.clone()], inputs: Vec::new() };
        let fs = StageReflection { uniforms: vec![slot], inputs: Vec::new() };
        assert_eq!(link_stages(&vs, &fs).unwrap().uniforms.len(), 1);
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("mat4x4<f32>"), Some(VariableKind::Mat4));
        assert_eq!(parse_kind(" vec3 < f32 > "), Some(VariableKind::Vec3));
        assert_eq!(parse_kind("vec3f"), Some(VariableKind::Vec3));
        assert_eq!(parse_kind("f32"), None);
    }

    #[test]
    fn test_struct_vertex_inputs() {
        let src = "
            struct VertexIn {
                @location(0) position: vec3<f32>,
                @location(1) normal: vec3<f32>,
            };
            struct VertexInput { @location(5) unused: vec3<f32> }
            @vertex
            fn vs_main(in: VertexIn, @builtin(instance_index) i: u32) -> @builtin(position) vec4<f32> {
                return vec4<f32>(in.position + in.normal, 1.0);
            }";
        let stage = reflect_stage(src, StageKind::Vertex).unwrap();
        let inputs: Vec<_> = stage.inputs.iter().map(|i| (i.location, i.name.as_str())).collect();
        assert_eq!(inputs, vec![(0, "position"), (1, "normal")]);
    }

    #[test]
    fn test_unsupported_vertex_input_names_type() {
        let src = "@vertex fn vs_main(@location(0) a_color: vec4<f32>) -> @builtin(position) vec4<f32> { return a_color; }";
        let err = reflect_stage(src, StageKind::Vertex).unwrap_err();
        assert!(err.contains("a_color"));
        assert!(err.contains("vec4<f32>"));
    }

    #[test]
    fn test_struct_input_without_definition_fails() {
        let src = "@vertex fn vs_main(in: Missing) -> @builtin(position) vec4<f32> { return vec4<f32>(); }";
        let err = reflect_stage(src, StageKind::Vertex).unwrap_err();
        assert!(err.contains("no @location"));
    }
}
