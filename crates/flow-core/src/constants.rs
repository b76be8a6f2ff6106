//! Constantes del compilador de pasos.
//!
//! `COMPILER_VERSION` forma parte del input del `definition_hash`: un cambio
//! en las reglas de compilación invalida las definiciones previas aunque la
//! configuración no cambie.

pub const COMPILER_VERSION: &str = "PF1.0";

/// Ids y tipos de los pasos sintetizados.
pub const WELCOME_STEP_ID: &str = "welcome";
pub const THANKYOU_STEP_ID: &str = "thankyou";
pub const DEMOGRAPHIC_STEP_ID: &str = "demographic";

pub const WELCOME_TYPE: &str = "welcome";
pub const THANKYOU_TYPE: &str = "thankyou";
pub const DEMOGRAPHIC_TYPE: &str = "demographic";

/// Contenido por defecto cuando la investigación no configura las pantallas.
pub const DEFAULT_WELCOME_TITLE: &str = "Bienvenida";
pub const DEFAULT_WELCOME_MESSAGE: &str = "Gracias por participar en esta investigación.";
pub const DEFAULT_THANKYOU_TITLE: &str = "Fin";
pub const DEFAULT_THANKYOU_MESSAGE: &str = "¡Gracias por completar el estudio!";
pub const DEFAULT_DEMOGRAPHIC_TITLE: &str = "Preguntas Demográficas";
pub const DEFAULT_DEMOGRAPHIC_DESCRIPTION: &str = "Por favor, complete las siguientes preguntas:";

/// Marcadores inertes del sanitizador.
pub const CIRCULAR_MARKER: &str = "[Circular]";
pub const DOM_ELEMENT_MARKER: &str = "[DOM Element]";
pub const REF_MARKER: &str = "[Ref]";
