//! POM file parsing: dependency declarations, parent references, profiles,
//! build plugins, repositories, and property interpolation.

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use ambit_util::errors::AmbitError;

/// A parsed POM (Project Object Model) file.
#[derive(Debug, Clone, Default)]
pub struct Pom {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub packaging: Option<String>,

    pub parent: Option<ParentRef>,
    /// Properties in declaration order.
    pub properties: Vec<(String, String)>,
    pub dependencies: Vec<PomDependency>,
    pub dependency_management: Vec<PomDependency>,
    pub profiles: Vec<PomProfile>,
    pub plugins: Vec<PomPlugin>,
    /// URLs from `<repositories>`.
    pub repositories: Vec<String>,
}

/// Reference to a parent POM.
#[derive(Debug, Clone)]
pub struct ParentRef {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub relative_path: Option<String>,
}

/// A dependency declared in a POM file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PomDependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub scope: Option<String>,
    pub optional: bool,
    pub classifier: Option<String>,
    pub type_: Option<String>,
}

impl PomDependency {
    /// `group:artifact` identifier.
    pub fn key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }

    pub fn is_bom_import(&self) -> bool {
        self.scope.as_deref() == Some("import") && self.type_.as_deref().unwrap_or("jar") == "pom"
    }
}

/// A `<profile>` block.
#[derive(Debug, Clone, Default)]
pub struct PomProfile {
    pub id: String,
    /// Whether the profile carries an `<activation>` block. Activation-free
    /// profiles are treated as always on.
    pub has_activation: bool,
    pub properties: Vec<(String, String)>,
    pub dependencies: Vec<PomDependency>,
    pub dependency_management: Vec<PomDependency>,
}

/// A `<build><plugins><plugin>` block, reduced to its coordinate and its
/// own dependencies.
#[derive(Debug, Clone, Default)]
pub struct PomPlugin {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub dependencies: Vec<PomDependency>,
}

impl PomPlugin {
    pub fn key(&self) -> String {
        let group = if self.group_id.is_empty() {
            "org.apache.maven.plugins"
        } else {
            &self.group_id
        };
        format!("{}:{}", group, self.artifact_id)
    }
}

impl Pom {
    /// Effective group ID (falls back to parent).
    pub fn effective_group_id(&self) -> Option<&str> {
        self.group_id
            .as_deref()
            .or(self.parent.as_ref().map(|p| p.group_id.as_str()))
    }

    /// Effective version (falls back to parent).
    pub fn effective_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .or(self.parent.as_ref().map(|p| p.version.as_str()))
    }

    /// Resolve `${property}` references in a string using the given
    /// property map and built-in project variables.
    pub fn interpolate(&self, input: &str, properties: &BTreeMap<String, String>) -> String {
        let mut result = input.to_string();
        let mut iterations = 0;
        while result.contains("${") && iterations < 20 {
            iterations += 1;
            let mut new = result.clone();
            while let Some(start) = new.find("${") {
                let Some(end) = new[start..].find('}') else {
                    break;
                };
                let key = &new[start + 2..start + end];
                let value = self.resolve_builtin(key).or_else(|| properties.get(key).cloned());
                if let Some(val) = value {
                    new = format!("{}{}{}", &new[..start], val, &new[start + end + 1..]);
                } else {
                    break;
                }
            }
            if new == result {
                break;
            }
            result = new;
        }
        result
    }

    fn resolve_builtin(&self, key: &str) -> Option<String> {
        match key {
            "project.groupId" | "pom.groupId" => self.effective_group_id().map(|s| s.to_string()),
            "project.artifactId" | "pom.artifactId" => self.artifact_id.clone(),
            "project.version" | "pom.version" => self.effective_version().map(|s| s.to_string()),
            "project.packaging" | "pom.packaging" => self.packaging.clone(),
            "project.parent.groupId" => self.parent.as_ref().map(|p| p.group_id.clone()),
            "project.parent.version" => self.parent.as_ref().map(|p| p.version.clone()),
            _ => None,
        }
    }
}

/// Where a `<dependency>` element being parsed will be committed.
enum DepSlot {
    Main,
    Management,
    Profile,
    ProfileManagement,
    Plugin,
}

/// Parse a POM XML string into a `Pom` struct.
pub fn parse_pom(xml: &str) -> miette::Result<Pom> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut pom = Pom::default();
    let mut path: Vec<String> = Vec::new();
    let mut text_buf = String::new();

    let mut current_dep: Option<(PomDependency, DepSlot)> = None;
    let mut current_parent: Option<ParentRef> = None;
    let mut current_profile: Option<PomProfile> = None;
    let mut current_plugin: Option<PomPlugin> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                path.push(tag);
                text_buf.clear();
                let ctx = path.join(">");

                match ctx.as_str() {
                    "project>dependencies>dependency" => {
                        current_dep = Some((PomDependency::default(), DepSlot::Main));
                    }
                    "project>dependencyManagement>dependencies>dependency" => {
                        current_dep = Some((PomDependency::default(), DepSlot::Management));
                    }
                    "project>profiles>profile>dependencies>dependency" => {
                        current_dep = Some((PomDependency::default(), DepSlot::Profile));
                    }
                    "project>profiles>profile>dependencyManagement>dependencies>dependency" => {
                        current_dep = Some((PomDependency::default(), DepSlot::ProfileManagement));
                    }
                    "project>build>plugins>plugin>dependencies>dependency" => {
                        current_dep = Some((PomDependency::default(), DepSlot::Plugin));
                    }
                    "project>parent" => {
                        current_parent = Some(ParentRef {
                            group_id: String::new(),
                            artifact_id: String::new(),
                            version: String::new(),
                            relative_path: None,
                        });
                    }
                    "project>profiles>profile" => {
                        current_profile = Some(PomProfile::default());
                    }
                    "project>profiles>profile>activation" => {
                        if let Some(profile) = current_profile.as_mut() {
                            profile.has_activation = true;
                        }
                    }
                    "project>build>plugins>plugin" => {
                        current_plugin = Some(PomPlugin::default());
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                text_buf = e.unescape().unwrap_or_default().to_string();
            }
            Ok(Event::End(_)) => {
                let ctx = path.join(">");
                let last = path.last().cloned().unwrap_or_default();

                // Properties, top-level and per-profile.
                if path.len() == 3 && path[1] == "properties" {
                    pom.properties.push((last.clone(), text_buf.clone()));
                } else if path.len() == 5
                    && path[1] == "profiles"
                    && path[3] == "properties"
                {
                    if let Some(profile) = current_profile.as_mut() {
                        profile.properties.push((last.clone(), text_buf.clone()));
                    }
                }

                // Dependency fields.
                if let Some((dep, _)) = current_dep.as_mut() {
                    match last.as_str() {
                        "groupId" if ctx.ends_with(">dependency>groupId") => {
                            dep.group_id = text_buf.clone();
                        }
                        "artifactId" if ctx.ends_with(">dependency>artifactId") => {
                            dep.artifact_id = text_buf.clone();
                        }
                        "version" if ctx.ends_with(">dependency>version") => {
                            dep.version = Some(text_buf.clone());
                        }
                        "scope" if ctx.ends_with(">dependency>scope") => {
                            dep.scope = Some(text_buf.clone());
                        }
                        "optional" if ctx.ends_with(">dependency>optional") => {
                            dep.optional = text_buf.trim() == "true";
                        }
                        "classifier" if ctx.ends_with(">dependency>classifier") => {
                            dep.classifier = Some(text_buf.clone());
                        }
                        "type" if ctx.ends_with(">dependency>type") => {
                            dep.type_ = Some(text_buf.clone());
                        }
                        _ => {}
                    }

                    if ctx.ends_with(">dependencies>dependency") {
                        if let Some((dep, slot)) = current_dep.take() {
                            match slot {
                                DepSlot::Main => pom.dependencies.push(dep),
                                DepSlot::Management => pom.dependency_management.push(dep),
                                DepSlot::Profile => {
                                    if let Some(profile) = current_profile.as_mut() {
                                        profile.dependencies.push(dep);
                                    }
                                }
                                DepSlot::ProfileManagement => {
                                    if let Some(profile) = current_profile.as_mut() {
                                        profile.dependency_management.push(dep);
                                    }
                                }
                                DepSlot::Plugin => {
                                    if let Some(plugin) = current_plugin.as_mut() {
                                        plugin.dependencies.push(dep);
                                    }
                                }
                            }
                        }
                    }
                }

                // Parent fields.
                if let Some(parent) = current_parent.as_mut() {
                    match ctx.as_str() {
                        "project>parent>groupId" => parent.group_id = text_buf.clone(),
                        "project>parent>artifactId" => parent.artifact_id = text_buf.clone(),
                        "project>parent>version" => parent.version = text_buf.clone(),
                        "project>parent>relativePath" => {
                            parent.relative_path = Some(text_buf.clone());
                        }
                        "project>parent" => pom.parent = current_parent.take(),
                        _ => {}
                    }
                }

                // Profile id and commit.
                if let Some(profile) = current_profile.as_mut() {
                    if ctx == "project>profiles>profile>id" {
                        profile.id = text_buf.clone();
                    } else if ctx == "project>profiles>profile" {
                        if let Some(profile) = current_profile.take() {
                            pom.profiles.push(profile);
                        }
                    }
                }

                // Plugin coordinate and commit.
                if let Some(plugin) = current_plugin.as_mut() {
                    match ctx.as_str() {
                        "project>build>plugins>plugin>groupId" => {
                            plugin.group_id = text_buf.clone();
                        }
                        "project>build>plugins>plugin>artifactId" => {
                            plugin.artifact_id = text_buf.clone();
                        }
                        "project>build>plugins>plugin>version" => {
                            plugin.version = Some(text_buf.clone());
                        }
                        "project>build>plugins>plugin" => {
                            if let Some(plugin) = current_plugin.take() {
                                pom.plugins.push(plugin);
                            }
                        }
                        _ => {}
                    }
                }

                // Repositories.
                if ctx == "project>repositories>repository>url" {
                    pom.repositories.push(text_buf.clone());
                }

                // Top-level project fields.
                if path.len() == 2 {
                    match last.as_str() {
                        "groupId" => pom.group_id = Some(text_buf.clone()),
                        "artifactId" => pom.artifact_id = Some(text_buf.clone()),
                        "version" => pom.version = Some(text_buf.clone()),
                        "packaging" => pom.packaging = Some(text_buf.clone()),
                        _ => {}
                    }
                }

                path.pop();
                text_buf.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AmbitError::Generic {
                    message: format!("Failed to parse POM XML: {e}"),
                }
                .into());
            }
            _ => {}
        }
    }

    Ok(pom)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
    <modelVersion>4.0.0</modelVersion>
    <groupId>org.example</groupId>
    <artifactId>my-lib</artifactId>
    <version>1.0.0</version>
    <packaging>jar</packaging>

    <properties>
        <abc.version>1.0.0</abc.version>
    </properties>

    <dependencies>
        <dependency>
            <groupId>org.example</groupId>
            <artifactId>abc</artifactId>
            <version>${abc.version}</version>
        </dependency>
        <dependency>
            <groupId>junit</groupId>
            <artifactId>junit</artifactId>
            <version>4.13.2</version>
            <scope>test</scope>
        </dependency>
    </dependencies>
</project>"#;

    #[test]
    fn parse_simple_pom() {
        let pom = parse_pom(SIMPLE_POM).unwrap();
        assert_eq!(pom.group_id.as_deref(), Some("org.example"));
        assert_eq!(pom.artifact_id.as_deref(), Some("my-lib"));
        assert_eq!(pom.version.as_deref(), Some("1.0.0"));
        assert_eq!(pom.packaging.as_deref(), Some("jar"));
        assert_eq!(pom.dependencies.len(), 2);
        assert_eq!(pom.properties, vec![("abc.version".into(), "1.0.0".into())]);
        assert_eq!(pom.dependencies[1].scope.as_deref(), Some("test"));
    }

    #[test]
    fn interpolation_with_properties() {
        let pom = parse_pom(SIMPLE_POM).unwrap();
        let props: BTreeMap<String, String> = pom.properties.iter().cloned().collect();
        assert_eq!(pom.interpolate("${abc.version}", &props), "1.0.0");
        assert_eq!(pom.interpolate("${project.version}", &props), "1.0.0");
        assert_eq!(pom.interpolate("${unknown}", &props), "${unknown}");
    }

    #[test]
    fn parent_ref_parsing() {
        let xml = r#"<?xml version="1.0"?>
<project>
    <parent>
        <groupId>org.example</groupId>
        <artifactId>parent-pom</artifactId>
        <version>2.0.0</version>
        <relativePath>../parent/pom.xml</relativePath>
    </parent>
    <artifactId>child</artifactId>
</project>"#;
        let pom = parse_pom(xml).unwrap();
        let p = pom.parent.as_ref().unwrap();
        assert_eq!(p.group_id, "org.example");
        assert_eq!(p.version, "2.0.0");
        assert_eq!(p.relative_path.as_deref(), Some("../parent/pom.xml"));
        assert_eq!(pom.effective_group_id(), Some("org.example"));
        assert_eq!(pom.effective_version(), Some("2.0.0"));
    }

    #[test]
    fn dependency_management_and_bom() {
        let xml = r#"<?xml version="1.0"?>
<project>
    <groupId>org.example</groupId>
    <artifactId>parent</artifactId>
    <version>1.0.0</version>

    <dependencyManagement>
        <dependencies>
            <dependency>
                <groupId>org.springframework</groupId>
                <artifactId>spring-framework-bom</artifactId>
                <version>5.3.20</version>
                <type>pom</type>
                <scope>import</scope>
            </dependency>
            <dependency>
                <groupId>com.google.guava</groupId>
                <artifactId>guava</artifactId>
                <version>32.0.0-jre</version>
            </dependency>
        </dependencies>
    </dependencyManagement>
</project>"#;
        let pom = parse_pom(xml).unwrap();
        assert_eq!(pom.dependency_management.len(), 2);
        assert!(pom.dependency_management[0].is_bom_import());
        assert!(!pom.dependency_management[1].is_bom_import());
    }

    #[test]
    fn profiles_with_and_without_activation() {
        let xml = r#"<?xml version="1.0"?>
<project>
    <groupId>g</groupId>
    <artifactId>a</artifactId>
    <version>1</version>
    <profiles>
        <profile>
            <id>default-on</id>
            <properties>
                <extra.version>3.0.0</extra.version>
            </properties>
            <dependencies>
                <dependency>
                    <groupId>org.extra</groupId>
                    <artifactId>extra</artifactId>
                    <version>${extra.version}</version>
                </dependency>
            </dependencies>
        </profile>
        <profile>
            <id>jdk8</id>
            <activation><jdk>1.8</jdk></activation>
            <dependencies>
                <dependency>
                    <groupId>org.old</groupId>
                    <artifactId>compat</artifactId>
                    <version>1.0</version>
                </dependency>
            </dependencies>
        </profile>
    </profiles>
</project>"#;
        let pom = parse_pom(xml).unwrap();
        assert_eq!(pom.profiles.len(), 2);
        assert_eq!(pom.profiles[0].id, "default-on");
        assert!(!pom.profiles[0].has_activation);
        assert_eq!(pom.profiles[0].dependencies.len(), 1);
        assert_eq!(
            pom.profiles[0].properties,
            vec![("extra.version".into(), "3.0.0".into())]
        );
        assert!(pom.profiles[1].has_activation);
    }

    #[test]
    fn plugins_and_repositories() {
        let xml = r#"<?xml version="1.0"?>
<project>
    <groupId>g</groupId>
    <artifactId>a</artifactId>
    <version>1</version>
    <repositories>
        <repository>
            <id>central-mirror</id>
            <url>https://repo.example.com/maven2</url>
        </repository>
    </repositories>
    <build>
        <plugins>
            <plugin>
                <groupId>org.apache.maven.plugins</groupId>
                <artifactId>maven-surefire-plugin</artifactId>
                <version>3.0.0</version>
                <dependencies>
                    <dependency>
                        <groupId>org.junit.platform</groupId>
                        <artifactId>junit-platform-launcher</artifactId>
                        <version>1.9.0</version>
                    </dependency>
                </dependencies>
            </plugin>
        </plugins>
    </build>
</project>"#;
        let pom = parse_pom(xml).unwrap();
        assert_eq!(pom.repositories, vec!["https://repo.example.com/maven2"]);
        assert_eq!(pom.plugins.len(), 1);
        let plugin = &pom.plugins[0];
        assert_eq!(plugin.key(), "org.apache.maven.plugins:maven-surefire-plugin");
        assert_eq!(plugin.dependencies.len(), 1);
        assert_eq!(plugin.dependencies[0].artifact_id, "junit-platform-launcher");
    }
}
