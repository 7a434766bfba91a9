//! Domain entities, mirroring the backend's wire shapes.
//!
//! Field names follow the backend's Spanish camelCase vocabulary; dates stay
//! ISO 8601 strings as received. Several fields are populated either as a
//! bare id or as an embedded object depending on the endpoint, modeled here
//! as untagged `*Ref` enums.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Activation state shared by most entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Estado {
  Activo,
  Inactivo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Genero {
  Masculino,
  Femenino,
  Otro,
}

/// Attention pipeline state of a patient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstadoAtencion {
  Pendiente,
  Atendido,
  Derivado,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paciente {
  #[serde(rename = "_id")]
  pub id: String,
  pub cedula: Option<String>,
  pub primer_nombre: String,
  pub segundo_nombre: Option<String>,
  pub primer_apellido: String,
  pub segundo_apellido: Option<String>,
  pub fecha_nacimiento: Option<String>,
  pub direccion: Option<String>,
  pub telefono: Option<String>,
  pub celular: Option<String>,
  pub genero: Option<Genero>,
  pub estado: Estado,
  pub estado_atencion: Option<EstadoAtencion>,
  pub created_at: Option<String>,
  pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medico {
  #[serde(rename = "_id")]
  pub id: String,
  pub cedula: String,
  pub primer_nombre: String,
  pub segundo_nombre: Option<String>,
  pub primer_apellido: String,
  pub segundo_apellido: Option<String>,
  pub fecha_nacimiento: Option<String>,
  pub lugar_nacimiento: Option<String>,
  pub nacionalidad: Option<String>,
  pub ciudad_donde_vive: Option<String>,
  pub direccion: Option<String>,
  pub telefono: Option<String>,
  pub celular: Option<String>,
  pub genero: Option<Genero>,
  #[serde(default)]
  pub especialidades: Vec<EspecialidadRef>,
  pub usuario: Option<UserRef>,
  pub estado: Estado,
  pub esta_activo: bool,
  pub created_at: Option<String>,
  pub updated_at: Option<String>,
}

/// A specialty reference: some endpoints embed the full object, others only
/// the id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EspecialidadRef {
  Id(String),
  Detalle(Especialidad),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Especialidad {
  #[serde(rename = "_id")]
  pub id: String,
  pub nombre: String,
  pub descripcion: Option<String>,
  pub estado: Estado,
  pub created_at: Option<String>,
  pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
  Id(String),
  Detalle(Box<User>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  #[serde(rename = "_id")]
  pub id: String,
  pub name: String,
  pub username: Option<String>,
  pub email: String,
  #[serde(default)]
  pub permissions: Vec<String>,
  #[serde(default)]
  pub roles: Vec<RoleRef>,
  pub created_at: Option<String>,
  pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleRef {
  Id(String),
  Detalle(Role),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
  #[serde(rename = "_id")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub permissions: Vec<String>,
  pub created_at: Option<String>,
  pub updated_at: Option<String>,
}

/// A patient's medical record with its optional sections
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FichaMedica {
  #[serde(rename = "_id")]
  pub id: String,
  pub paciente: PacienteRef,
  pub antecedentes_personales: Option<Value>,
  pub antecedentes_familiares: Option<Value>,
  #[serde(default)]
  pub operaciones_quirurgicas: Vec<Value>,
  #[serde(default)]
  pub ginecologia_obstetrica: Vec<Value>,
  #[serde(default)]
  pub adicciones: Vec<Value>,
  pub exploracion_fisica: Option<Value>,
  pub examen_neurologico: Option<Value>,
  pub organos_sentidos: Option<Value>,
  #[serde(default)]
  pub consultas_medicas: Vec<ConsultaMedica>,
  pub estado: Estado,
  pub created_at: Option<String>,
  pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PacienteRef {
  Id(String),
  Detalle(Box<Paciente>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultaMedica {
  #[serde(rename = "_id")]
  pub id: String,
  pub paciente: Option<String>,
  pub motivo: Option<String>,
  pub diagnostico: Option<String>,
  pub fecha: Option<String>,
  pub estado: Option<Estado>,
}

/// Sections that can be attached to a medical record via
/// `POST /fichas/{id}/{section}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FichaSection {
  AntecedentesPersonales,
  AntecedentesFamiliares,
  OperacionesQuirurgicas,
  GinecologiaObstetrica,
  Adicciones,
  ExploracionFisica,
  ExamenNeurologico,
  OrganosSentidos,
}

impl FichaSection {
  /// URL path segment for this section
  pub fn path_segment(&self) -> &'static str {
    match self {
      FichaSection::AntecedentesPersonales => "antecedentes-personales",
      FichaSection::AntecedentesFamiliares => "antecedentes-familiares",
      FichaSection::OperacionesQuirurgicas => "operaciones-quirurgicas",
      FichaSection::GinecologiaObstetrica => "ginecologia-obstetrica",
      FichaSection::Adicciones => "adicciones",
      FichaSection::ExploracionFisica => "exploracion-fisica",
      FichaSection::ExamenNeurologico => "examen-neurologico",
      FichaSection::OrganosSentidos => "organos-sentidos",
    }
  }
}

/// Aggregate counters for the dashboard landing page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
  #[serde(default)]
  pub total_pacientes: u64,
  #[serde(default)]
  pub total_consultas: u64,
  #[serde(default)]
  pub total_medicos: u64,
  #[serde(default)]
  pub consultas_hoy: u64,
  #[serde(default)]
  pub consultas_pendientes: u64,
  #[serde(default)]
  pub consultas_urgentes: u64,
  #[serde(default)]
  pub medicos_activos: u64,
  /// Counters keyed by consultation state ("Pendiente", "Concluida", ...)
  #[serde(default)]
  pub consultas_por_estado: HashMap<String, u64>,
  #[serde(default)]
  pub consultas_por_especialidad: Vec<EspecialidadTotal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EspecialidadTotal {
  pub id: String,
  pub nombre: String,
  pub total: u64,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_paciente_roundtrips_camel_case() {
    let paciente: Paciente = serde_json::from_value(json!({
      "_id": "p1",
      "primerNombre": "Ana",
      "primerApellido": "Paredes",
      "genero": "Femenino",
      "estado": "Activo",
      "estadoAtencion": "Pendiente"
    }))
    .unwrap();

    assert_eq!(paciente.primer_nombre, "Ana");
    assert_eq!(paciente.genero, Some(Genero::Femenino));
    assert_eq!(paciente.estado_atencion, Some(EstadoAtencion::Pendiente));
    assert_eq!(paciente.segundo_nombre, None);

    let back = serde_json::to_value(&paciente).unwrap();
    assert_eq!(back["primerNombre"], "Ana");
    assert_eq!(back["_id"], "p1");
  }

  #[test]
  fn test_especialidades_accept_ids_and_objects() {
    let medico: Medico = serde_json::from_value(json!({
      "_id": "m1",
      "cedula": "001",
      "primerNombre": "Luis",
      "primerApellido": "Vega",
      "especialidades": [
        "esp1",
        {"_id": "esp2", "nombre": "Cardiología", "estado": "Activo"}
      ],
      "estado": "Activo",
      "estaActivo": true
    }))
    .unwrap();

    assert_eq!(medico.especialidades.len(), 2);
    assert!(matches!(&medico.especialidades[0], EspecialidadRef::Id(id) if id == "esp1"));
    assert!(
      matches!(&medico.especialidades[1], EspecialidadRef::Detalle(e) if e.nombre == "Cardiología")
    );
  }

  #[test]
  fn test_ficha_paciente_embedded_or_id() {
    let ficha: FichaMedica = serde_json::from_value(json!({
      "_id": "f1",
      "paciente": {"_id": "p1", "primerNombre": "Ana", "primerApellido": "Paredes", "estado": "Activo"},
      "estado": "Activo"
    }))
    .unwrap();
    assert!(matches!(ficha.paciente, PacienteRef::Detalle(_)));
    assert!(ficha.consultas_medicas.is_empty());

    let ficha: FichaMedica = serde_json::from_value(json!({
      "_id": "f2",
      "paciente": "p1",
      "estado": "Activo"
    }))
    .unwrap();
    assert!(matches!(ficha.paciente, PacienteRef::Id(_)));
  }

  #[test]
  fn test_dashboard_stats_tolerates_missing_counters() {
    let stats: DashboardStats = serde_json::from_value(json!({
      "totalPacientes": 12,
      "consultasPorEstado": {"Pendiente": 3, "Concluida": 7}
    }))
    .unwrap();

    assert_eq!(stats.total_pacientes, 12);
    assert_eq!(stats.consultas_por_estado["Pendiente"], 3);
    assert_eq!(stats.total_medicos, 0);
    assert!(stats.consultas_por_especialidad.is_empty());
  }

  #[test]
  fn test_section_path_segments() {
    assert_eq!(
      FichaSection::AntecedentesPersonales.path_segment(),
      "antecedentes-personales"
    );
    assert_eq!(
      FichaSection::OrganosSentidos.path_segment(),
      "organos-sentidos"
    );
  }
}
